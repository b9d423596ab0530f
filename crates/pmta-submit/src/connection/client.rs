//! Request/response client for one acceptor session.
//!
//! [`Client`] owns the stream and knows the command sequence. It returns raw
//! [`Reply`] values for the transaction commands and leaves the mapping to
//! submission outcomes to the session layer.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use super::{AcceptorStream, ServerInfo};
use crate::command::Command;
use crate::error::{Category, Error, Origin, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{AuthMechanism, Extension, Reply, ReplyCode};

/// Upper bound on lines in one reply; EHLO lists are the longest in practice.
const MAX_REPLY_LINES: usize = 256;

/// Acceptor client.
#[derive(Debug)]
pub struct Client<S = TcpStream> {
    stream: AcceptorStream<S>,
    server_info: ServerInfo,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the greeting and greets back with `EHLO`, falling back to
    /// `HELO` if the acceptor does not understand it.
    ///
    /// # Errors
    ///
    /// Returns a [`Category::Service`] error if the greeting or both
    /// hellos are rejected, or [`Category::Io`] on transport failure.
    pub async fn handshake(mut stream: AcceptorStream<S>, client_hostname: &str) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(rejected(Origin::Connection, "greeting", &greeting));
        }

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(%hostname, "acceptor greeted");

        let mut client = Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
        };

        let reply = client
            .command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            client.server_info.extensions = reply
                .message
                .iter()
                .skip(1)
                .map(|line| Extension::parse(line))
                .collect();
        } else if reply.code == ReplyCode::SYNTAX_ERROR || reply.code == ReplyCode::NOT_IMPLEMENTED
        {
            debug!(code = reply.code.as_u16(), "EHLO refused, falling back to HELO");
            let reply = client
                .command(Command::Helo {
                    hostname: client_hostname.to_string(),
                })
                .await?;
            if !reply.is_success() {
                return Err(rejected(Origin::Connection, "HELO", &reply));
            }
        } else {
            return Err(rejected(Origin::Connection, "EHLO", &reply));
        }

        Ok(client)
    }

    /// Returns the greeting hostname and advertised extensions.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Authenticates with `PLAIN`, or `LOGIN` if that is all the acceptor
    /// offers.
    ///
    /// # Errors
    ///
    /// Returns a [`Category::Security`] error if no usable mechanism is
    /// advertised or the acceptor answers with an authentication failure
    /// code, and [`Category::Service`] for any other negative reply.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let mechanisms = self.server_info.auth_mechanisms();
        let mechanism = if mechanisms.contains(&AuthMechanism::Plain) {
            AuthMechanism::Plain
        } else if mechanisms.contains(&AuthMechanism::Login) {
            AuthMechanism::Login
        } else {
            return Err(Origin::Connection.error(
                Category::Security,
                "acceptor does not advertise AUTH PLAIN or LOGIN",
            ));
        };
        debug!(mechanism = mechanism.as_str(), %username, "authenticating");

        let reply = match mechanism {
            AuthMechanism::Plain => {
                let credentials = format!("\0{username}\0{password}");
                self.command(Command::Auth {
                    mechanism,
                    initial_response: Some(STANDARD.encode(credentials.as_bytes())),
                })
                .await?
            }
            AuthMechanism::Login => {
                let mut reply = self
                    .command(Command::Auth {
                        mechanism,
                        initial_response: None,
                    })
                    .await?;
                for secret in [username, password] {
                    if reply.code != ReplyCode::AUTH_CONTINUE {
                        break;
                    }
                    reply = self
                        .command(Command::AuthResponse(STANDARD.encode(secret.as_bytes())))
                        .await?;
                }
                reply
            }
        };

        if reply.code == ReplyCode::AUTH_SUCCESS {
            return Ok(());
        }
        warn!(code = reply.code.as_u16(), "authentication refused");
        if reply.code.is_auth_failure() {
            Err(Origin::Connection.error(
                Category::Security,
                format!("authentication failed: {}", reply.describe()),
            ))
        } else {
            Err(rejected(Origin::Connection, "AUTH", &reply))
        }
    }

    /// Sends one command and reads its reply.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::Io`] error on transport failure or a
    /// malformed reply. Negative replies are returned as values.
    pub async fn command(&mut self, cmd: Command) -> Result<Reply> {
        trace!(verb = cmd.verb(), "sending command");
        self.stream
            .write_all(&cmd.serialize())
            .await
            .map_err(|e| Origin::Connection.io(&e))?;
        let reply = read_reply(&mut self.stream).await?;
        trace!(verb = cmd.verb(), code = reply.code.as_u16(), "reply received");
        Ok(reply)
    }

    /// Sends content already in wire form (see [`encode_data`]) after a
    /// `354` and reads the final reply.
    ///
    /// # Errors
    ///
    /// Same as [`Client::command`].
    pub async fn send_data(&mut self, wire: &[u8]) -> Result<Reply> {
        trace!(bytes = wire.len(), "sending message content");
        self.stream
            .write_all(wire)
            .await
            .map_err(|e| Origin::Connection.io(&e))?;
        read_reply(&mut self.stream).await
    }

    /// Sends `RSET`.
    ///
    /// # Errors
    ///
    /// Same as [`Client::command`]. A negative reply is logged only.
    pub async fn reset(&mut self) -> Result<()> {
        let reply = self.command(Command::Rset).await?;
        if !reply.is_success() {
            warn!(code = reply.code.as_u16(), "RSET refused");
        }
        Ok(())
    }

    /// Sends `QUIT` and shuts the socket down.
    ///
    /// # Errors
    ///
    /// Same as [`Client::command`].
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.command(Command::Quit).await;
        self.stream.shutdown().await;
        let reply = reply?;
        if reply.code != ReplyCode::CLOSING && !reply.is_success() {
            debug!(code = reply.code.as_u16(), "unexpected QUIT reply");
        }
        Ok(())
    }
}

async fn read_reply<S>(stream: &mut AcceptorStream<S>) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let line = stream
            .read_line()
            .await
            .map_err(|e| Origin::Connection.io(&e))?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);
        if !is_last && lines.len() >= MAX_REPLY_LINES {
            return Err(Origin::Connection.error(
                Category::Io,
                format!("reply exceeds {MAX_REPLY_LINES} lines"),
            ));
        }

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Builds the `Service` error for a negative reply.
pub(crate) fn rejected(origin: Origin, stage: &str, reply: &Reply) -> Error {
    origin.error(
        Category::Service,
        format!("{stage} rejected: {}", reply.describe()),
    )
}

/// Converts message content to its DATA wire form in one buffer: line
/// endings normalized to CRLF, lines starting with `.` dot-stuffed, and the
/// terminating `.` line added.
pub(crate) fn encode_data(content: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(content.len() + content.len() / 64 + 8);

    let body = content.strip_suffix(b"\n").unwrap_or(content);
    if !content.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                wire.push(b'.');
            }
            wire.extend_from_slice(line);
            wire.extend_from_slice(b"\r\n");
        }
    }

    wire.extend_from_slice(b".\r\n");
    wire
}
