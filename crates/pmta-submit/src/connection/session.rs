//! The public connection handle.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{Client, encode_data, rejected};
use super::report::{Outcome, SubmitReport};
use super::{ConnectionConfig, ServerInfo, stream};
use crate::command::{Command, MailParams};
use crate::error::{Category, Error, Origin, Result};
use crate::message::{Encoding, Message, ReturnType};
use crate::recipient::Recipient;
use crate::types::{Address, Reply, ReplyCode};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Created, handshake not yet run.
    Disconnected,
    /// Handshake (and authentication, if configured) succeeded.
    Connected,
    /// Closed explicitly, or after a failed handshake, a transport error,
    /// or an exchange that was abandoned halfway. Terminal.
    Closed,
}

#[derive(Debug)]
struct Inner {
    /// Taken out for the duration of an exchange. `Connected` without a
    /// client means the exchange was dropped before it finished.
    client: Option<Client>,
    state: State,
    last_error: Option<Error>,
}

impl Inner {
    fn settle(&mut self) {
        if self.state == State::Connected && self.client.is_none() {
            warn!("previous exchange was abandoned mid-transaction, closing connection");
            self.state = State::Closed;
            self.last_error = Some(Origin::Connection.error(
                Category::Io,
                "previous exchange was interrupted",
            ));
        }
    }

    fn take_client(&mut self) -> Result<Client> {
        self.settle();
        match (self.state, self.client.take()) {
            (State::Connected, Some(client)) => Ok(client),
            (_, client) => {
                self.client = client;
                Err(Origin::Connection.error(
                    Category::IllegalState,
                    "connection is not open",
                ))
            }
        }
    }

    fn put_back<T>(&mut self, client: Client, result: &Result<T>) {
        match result {
            Err(e) if e.is_connection() && e.category() == Category::Io => {
                warn!(error = %e, "transport failure, closing connection");
                self.state = State::Closed;
            }
            _ => self.client = Some(client),
        }
    }
}

/// One live session with a mail acceptor.
///
/// All session state sits behind an async mutex, so a `Connection` can be
/// shared by reference between tasks and submissions are serialized. It is
/// neither `Clone` nor `Copy`. Dropping it releases the socket; call
/// [`Connection::close`] first to say `QUIT` politely.
///
/// If a [`Connection::submit_message`] or [`Connection::noop`] future is
/// dropped before it completes, the socket goes with it and the connection
/// is [`State::Closed`] from then on.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    inner: Mutex<Inner>,
}

/// One envelope plus its content in DATA wire form.
#[derive(Debug)]
struct Transaction {
    recipients: Vec<Arc<Recipient>>,
    data: Vec<u8>,
}

/// How far a transaction got.
enum Delivery {
    /// Content sent; RCPT outcomes are in the report.
    Completed,
    /// `MAIL FROM`, `DATA` or the content was refused.
    Refused { stage: &'static str, reply: Reply },
}

impl Connection {
    /// Creates an unconnected handle. Call [`Connection::establish`] next.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                client: None,
                state: State::Disconnected,
                last_error: None,
            }),
        }
    }

    /// Connects, greets, and authenticates if credentials are configured.
    ///
    /// # Errors
    ///
    /// - [`Category::IllegalArgument`] if the configured client hostname
    ///   cannot be sent with `EHLO`.
    /// - [`Category::Io`] if the acceptor is unreachable, refuses the
    ///   connection, or times out.
    /// - [`Category::Service`] if the greeting or `EHLO`/`HELO` is rejected.
    /// - [`Category::Security`] if authentication fails.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let connection = Self::new(config);
        connection.establish().await?;
        Ok(connection)
    }

    /// Connects to `server:port`, authenticating only if both `username`
    /// and `password` are given.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub async fn open(
        server: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let mut builder = ConnectionConfig::builder().host(server).port(port);
        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(username, password);
        }
        Self::connect(builder.build()).await
    }

    /// Runs the handshake on a handle created with [`Connection::new`].
    ///
    /// On failure the handle moves to [`State::Closed`] and cannot be used.
    ///
    /// # Errors
    ///
    /// [`Category::IllegalState`] unless the handle is
    /// [`State::Disconnected`]; otherwise see [`Connection::connect`].
    pub async fn establish(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Disconnected {
            return Err(Origin::Connection.error(
                Category::IllegalState,
                "connection has already been established or closed",
            ));
        }

        match self.handshake().await {
            Ok(client) => {
                info!(
                    host = %self.config.host(),
                    port = self.config.port(),
                    acceptor = %client.server_info().hostname,
                    "connected to acceptor"
                );
                inner.client = Some(client);
                inner.state = State::Connected;
                inner.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(
                    host = %self.config.host(),
                    port = self.config.port(),
                    error = %e,
                    "connection failed"
                );
                inner.state = State::Closed;
                inner.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<Client> {
        self.config.validate()?;

        let stream = stream::connect(
            self.config.host(),
            self.config.port(),
            self.config.connect_timeout(),
            self.config.io_timeout(),
        )
        .await
        .map_err(|e| Origin::Connection.io(&e))?;

        let mut client = Client::handshake(stream, self.config.client_hostname()).await?;

        if let Some(credentials) = self.config.credentials() {
            if let Err(e) = client
                .authenticate(credentials.username(), credentials.password())
                .await
            {
                if e.category() != Category::Io {
                    let _ = client.quit().await;
                }
                return Err(e);
            }
        }

        Ok(client)
    }

    /// Submits `message` and reports a status per recipient.
    ///
    /// A message without merge data goes out as one transaction for all
    /// recipients. With merge data, each recipient gets its own transaction
    /// carrying its personalized render; a refused transaction is recorded
    /// as a rejection for its recipient and the rest still go out.
    ///
    /// Once the local checks pass the message is marked submitted and its
    /// recipients are locked; that happens before anything is sent.
    ///
    /// # Errors
    ///
    /// - Connection [`Category::IllegalState`] unless connected.
    /// - Message [`Category::IllegalState`] if already submitted.
    /// - Message [`Category::IllegalArgument`] if it has no recipients, no
    ///   parts, 8-bit content under 7-bit encoding, or exceeds the
    ///   acceptor's advertised size limit.
    /// - Message [`Category::Service`] if `MAIL FROM`, `DATA`, or the
    ///   content is rejected and no recipient was delivered.
    /// - Recipient [`Category::Service`] if every recipient is rejected.
    /// - Connection [`Category::Io`] on transport failure; the connection
    ///   is closed afterwards.
    pub async fn submit_message(&self, message: &mut Message) -> Result<SubmitReport> {
        let mut inner = self.inner.lock().await;
        let result = match inner.take_client() {
            Ok(mut client) => {
                let result = Self::submit_with(&mut client, message).await;
                inner.put_back(client, &result);
                result
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            debug!(error = %e, "submission failed");
        }
        inner.last_error = result.as_ref().err().cloned();
        result
    }

    async fn submit_with(client: &mut Client, message: &mut Message) -> Result<SubmitReport> {
        message.check_submittable()?;
        let transactions = match plan(message, client.server_info()) {
            Ok(transactions) => transactions,
            Err(e) => return message.record(Err(e)),
        };
        message.mark_submitted();

        let per_recipient = message.has_merge_data();
        debug!(
            from = %message.originator(),
            recipients = message.recipients().len(),
            transactions = transactions.len(),
            "submitting message"
        );

        let mut report = SubmitReport::default();
        let mut refusal = None;
        for transaction in &transactions {
            let params = mail_params(message, client.server_info(), transaction.data.len());
            let dsn = client.server_info().supports_dsn();
            let delivery =
                run_transaction(client, message.originator(), params, dsn, transaction, &mut report)
                    .await?;

            if let Delivery::Refused { stage, reply } = delivery {
                let error = rejected(Origin::Message, stage, &reply);
                if !per_recipient {
                    return Err(error);
                }
                warn!(error = %error, "personalized transaction refused");
                for recipient in &transaction.recipients {
                    report.push(recipient.address().clone(), Outcome::rejected(&reply));
                }
                refusal = Some(error);
            }
        }

        if !report.any_accepted() {
            if let Some(error) = refusal {
                return Err(error);
            }
            let last = report
                .rejected()
                .last()
                .and_then(|status| match &status.outcome {
                    Outcome::Rejected { code, message } => Some(format!("{code} {message}")),
                    Outcome::Accepted => None,
                })
                .unwrap_or_default();
            return Err(Origin::Recipient.error(
                Category::Service,
                format!("all recipients rejected: {}", last.trim_end()),
            ));
        }

        info!(
            accepted = report.accepted().count(),
            rejected = report.rejected().count(),
            "message submitted"
        );
        Ok(report)
    }

    /// Sends `NOOP` to keep an idle session alive.
    ///
    /// # Errors
    ///
    /// - Connection [`Category::IllegalState`] unless connected.
    /// - Connection [`Category::Service`] if the acceptor refuses it.
    /// - Connection [`Category::Io`] on transport failure; the connection
    ///   is closed afterwards.
    pub async fn noop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let result = match inner.take_client() {
            Ok(mut client) => {
                let result = match client.command(Command::Noop).await {
                    Ok(reply) if reply.is_success() => Ok(()),
                    Ok(reply) => Err(rejected(Origin::Connection, "NOOP", &reply)),
                    Err(e) => Err(e),
                };
                inner.put_back(client, &result);
                result
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            inner.last_error = Some(e.clone());
        }
        result
    }

    /// Sends `QUIT` if connected and releases the socket. Safe to call any
    /// number of times.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(client) = inner.client.take() {
            if let Err(e) = client.quit().await {
                debug!(error = %e, "QUIT failed during close");
            }
            info!(host = %self.config.host(), "connection closed");
        }
        inner.state = State::Closed;
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> State {
        let mut inner = self.inner.lock().await;
        inner.settle();
        inner.state
    }

    /// Returns the most recent handshake, transport, or submission error.
    /// A successful submission clears it.
    pub async fn last_error(&self) -> Option<Error> {
        let mut inner = self.inner.lock().await;
        inner.settle();
        inner.last_error.clone()
    }

    /// Returns the acceptor's greeting hostname and extensions while
    /// connected.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.inner
            .lock()
            .await
            .client
            .as_ref()
            .map(|client| client.server_info().clone())
    }

    /// Returns the configuration this handle was created with.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the acceptor host.
    #[must_use]
    pub fn server(&self) -> &str {
        self.config.host()
    }

    /// Returns the acceptor port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.config.port()
    }

    /// Returns the configured username.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.config.credentials().map(|c| c.username())
    }

    /// Returns the configured password.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.config.credentials().map(|c| c.password())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.inner.get_mut().client.is_some() {
            debug!(
                host = %self.config.host(),
                "connection dropped while open, releasing socket"
            );
        }
    }
}

/// Renders every transaction to its wire form up front so local failures
/// surface before the message is marked submitted. The size limit applies
/// to the bytes that go on the wire.
fn plan(message: &Message, info: &ServerInfo) -> Result<Vec<Transaction>> {
    let transactions = if message.has_merge_data() {
        message
            .recipients()
            .iter()
            .map(|recipient| {
                Ok(Transaction {
                    recipients: vec![Arc::clone(recipient)],
                    data: encode_data(&message.content_for(Some(recipient.as_ref()))?),
                })
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![Transaction {
            recipients: message.recipients().to_vec(),
            data: encode_data(&message.content_for(None)?),
        }]
    };

    if let Some(limit) = info.max_message_size() {
        if let Some(largest) = transactions.iter().map(|t| t.data.len()).max() {
            if largest > limit {
                return Err(Origin::Message.error(
                    Category::IllegalArgument,
                    format!("message is {largest} bytes, acceptor limit is {limit}"),
                ));
            }
        }
    }

    Ok(transactions)
}

/// Builds the `MAIL FROM` parameters the acceptor can understand. Requested
/// options it does not advertise are dropped with a warning.
fn mail_params(message: &Message, info: &ServerInfo, size: usize) -> MailParams {
    let mut params = MailParams::default();

    if let Some(encoding) = message.encoding() {
        if info.supports_8bitmime() {
            params.body = Some(encoding.body_param());
        } else if encoding == Encoding::EightBit {
            warn!("acceptor does not advertise 8BITMIME, sending without BODY=");
        }
    }

    if info.supports_size() {
        params.size = Some(size);
    }

    let wants_dsn = message.return_type().is_some() || message.envelope_id().is_some();
    if info.supports_dsn() {
        params.ret = message.return_type().map(ReturnType::as_param);
        params.envid = message.envelope_id().map(str::to_string);
    } else if wants_dsn {
        warn!("acceptor does not advertise DSN, dropping RET and ENVID");
    }

    if message.verp() {
        match info.verp_keyword() {
            Some(keyword) => params.verp = Some(keyword.to_string()),
            None => warn!("acceptor does not advertise VERP, sending without it"),
        }
    }

    params
}

/// Runs one `MAIL`/`RCPT`/`DATA` exchange. RCPT outcomes land in `report`
/// unless a later stage refuses the transaction.
async fn run_transaction(
    client: &mut Client,
    originator: &Address,
    params: MailParams,
    dsn: bool,
    transaction: &Transaction,
    report: &mut SubmitReport,
) -> Result<Delivery> {
    let reply = client
        .command(Command::MailFrom {
            from: originator.clone(),
            params,
        })
        .await?;
    if !reply.is_success() {
        client.reset().await?;
        return Ok(Delivery::Refused {
            stage: "MAIL FROM",
            reply,
        });
    }

    let mut outcomes = Vec::with_capacity(transaction.recipients.len());
    for recipient in &transaction.recipients {
        let notify = if dsn {
            recipient.requested_notify()
        } else {
            None
        };
        let reply = client
            .command(Command::RcptTo {
                to: recipient.address().clone(),
                notify,
            })
            .await?;

        if reply.is_success() {
            outcomes.push((recipient.address().clone(), Outcome::Accepted));
        } else {
            debug!(
                to = %recipient.address(),
                code = reply.code.as_u16(),
                "recipient rejected"
            );
            outcomes.push((recipient.address().clone(), Outcome::rejected(&reply)));
        }
    }

    if !outcomes.iter().any(|(_, o)| o.is_accepted()) {
        client.reset().await?;
        for (address, outcome) in outcomes {
            report.push(address, outcome);
        }
        return Ok(Delivery::Completed);
    }

    let reply = client.command(Command::Data).await?;
    if reply.code != ReplyCode::START_DATA {
        client.reset().await?;
        return Ok(Delivery::Refused {
            stage: "DATA",
            reply,
        });
    }

    let reply = client.send_data(&transaction.data).await?;
    if !reply.is_success() {
        return Ok(Delivery::Refused {
            stage: "message content",
            reply,
        });
    }

    for (address, outcome) in outcomes {
        report.push(address, outcome);
    }
    Ok(Delivery::Completed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::types::Extension;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "mta".to_string(),
            extensions: lines.iter().map(|l| Extension::parse(l)).collect(),
        }
    }

    fn message() -> Message {
        let mut msg = Message::new("a@b.com").unwrap();
        msg.begin_part(0).unwrap();
        msg.add_data("Subject: x\r\n\r\nhi\r\n").unwrap();
        msg.add_recipient(Recipient::shared("c@d.com").unwrap()).unwrap();
        msg
    }

    #[test]
    fn params_follow_advertised_extensions() {
        let mut msg = message();
        msg.set_encoding(Some(Encoding::EightBit)).unwrap();
        msg.set_return_type(Some(ReturnType::Headers)).unwrap();
        msg.set_envelope_id("env 1").unwrap();
        msg.set_verp(true).unwrap();

        let params = mail_params(&msg, &info(&["8BITMIME", "SIZE 100000", "DSN", "XVERP"]), 42);
        assert_eq!(params.body, Some("8BITMIME"));
        assert_eq!(params.size, Some(42));
        assert_eq!(params.ret, Some("HDRS"));
        assert_eq!(params.envid.as_deref(), Some("env 1"));
        assert_eq!(params.verp.as_deref(), Some("XVERP"));
    }

    #[test]
    fn params_skip_unadvertised_options() {
        let mut msg = message();
        msg.set_encoding(Some(Encoding::EightBit)).unwrap();
        msg.set_return_type(Some(ReturnType::Full)).unwrap();
        msg.set_verp(true).unwrap();

        assert_eq!(mail_params(&msg, &info(&[]), 42), MailParams::default());
    }

    #[test]
    fn plan_single_transaction_without_merge_data() {
        let mut msg = message();
        msg.add_recipient(Recipient::shared("e@f.com").unwrap()).unwrap();

        let plan = plan(&msg, &info(&[])).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].recipients.len(), 2);
        assert_eq!(plan[0].data, b"Subject: x\r\n\r\nhi\r\n.\r\n");
    }

    #[test]
    fn plan_one_transaction_per_recipient_with_merge_data() {
        let mut msg = message();
        msg.add_merge_data("Bye {{name}}\r\n").unwrap();
        let ann = Recipient::shared("ann@f.com").unwrap();
        ann.define_variable("name", "Ann").unwrap();
        msg.add_recipient(ann).unwrap();

        let plan = plan(&msg, &info(&[])).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan[0].data.ends_with(b"Bye {{name}}\r\n.\r\n"));
        assert!(plan[1].data.ends_with(b"Bye Ann\r\n.\r\n"));
    }

    #[test]
    fn plan_enforces_advertised_size() {
        let msg = message();
        let err = plan(&msg, &info(&["SIZE 5"])).unwrap_err();
        assert!(err.is_message());
        assert_eq!(err.category(), Category::IllegalArgument);
    }

    #[test]
    fn plan_counts_wire_bytes_against_size() {
        // 18 bytes rendered, 21 once the terminating dot line is added
        let msg = message();
        assert!(plan(&msg, &info(&["SIZE 21"])).is_ok());
        let err = plan(&msg, &info(&["SIZE 20"])).unwrap_err();
        assert_eq!(err.category(), Category::IllegalArgument);
    }

    #[tokio::test]
    async fn new_handle_is_disconnected() {
        let conn = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.state().await, State::Disconnected);
        assert!(conn.server_info().await.is_none());
        assert_eq!(conn.server(), "127.0.0.1");
        assert_eq!(conn.port(), 25);
        assert!(conn.username().is_none());
    }

    #[tokio::test]
    async fn submit_before_establish_is_illegal() {
        let conn = Connection::new(ConnectionConfig::default());
        let mut msg = message();

        let err = conn.submit_message(&mut msg).await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.category(), Category::IllegalState);
        assert!(!msg.is_submitted());
        assert_eq!(conn.last_error().await, Some(err));
    }

    #[tokio::test]
    async fn close_without_connecting_is_fine() {
        let conn = Connection::new(ConnectionConfig::default());
        conn.close().await;
        conn.close().await;
        assert_eq!(conn.state().await, State::Closed);

        let err = conn.establish().await.unwrap_err();
        assert_eq!(err.category(), Category::IllegalState);
    }

    #[tokio::test]
    async fn noop_requires_open_connection() {
        let conn = Connection::new(ConnectionConfig::default());
        let err = conn.noop().await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.category(), Category::IllegalState);
    }

    #[tokio::test]
    async fn control_characters_in_client_hostname_fail_before_connecting() {
        let config = ConnectionConfig::builder()
            .port(1)
            .client_hostname("client\r\nQUIT")
            .build();
        let conn = Connection::new(config);

        let err = conn.establish().await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.category(), Category::IllegalArgument);
        assert_eq!(conn.state().await, State::Closed);
    }
}
