//! Outbound messages.
//!
//! A [`Message`] collects the return path, numbered body parts, prepended
//! headers, routing hints, and the ordered recipient list. It is submitted
//! through a [`Connection`](crate::Connection) exactly once; after that
//! every mutating call fails with [`Category::IllegalState`].
//!
//! ## Example
//!
//! ```
//! use pmta_submit::{Message, Recipient};
//!
//! let mut message = Message::new("bounces@example.com")?;
//! message.add_date_header()?;
//! message.begin_part(1)?;
//! message.add_data("Subject: Welcome\r\n\r\n")?;
//! message.add_merge_data("Hello {{name}}\r\n")?;
//!
//! let rcpt = Recipient::shared("ann@example.org")?;
//! rcpt.define_variable("name", "Ann")?;
//! message.add_recipient(rcpt.clone())?;
//!
//! assert!(message.render_for(&rcpt).ends_with(b"Hello Ann\r\n"));
//! # Ok::<(), pmta_submit::Error>(())
//! ```

mod body;
mod merge;
mod part;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Category, Error, Origin, Result};
use crate::recipient::Recipient;
use crate::types::Address;

pub use merge::render;
pub use part::{Part, Segment};

/// Content transfer encoding requested for the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data (`BODY=8BITMIME`).
    EightBit,
    /// Body is base64-encoded before transmission.
    Base64,
}

impl Encoding {
    /// Returns the `BODY=` parameter value for this encoding.
    #[must_use]
    pub const fn body_param(self) -> &'static str {
        match self {
            Self::SevenBit | Self::Base64 => "7BIT",
            Self::EightBit => "8BITMIME",
        }
    }
}

/// How much of a bounced message the acceptor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// Headers only (`RET=HDRS`).
    Headers,
    /// Full message (`RET=FULL`).
    Full,
}

impl ReturnType {
    /// Returns the `RET=` parameter value.
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Headers => "HDRS",
            Self::Full => "FULL",
        }
    }
}

/// One outbound email.
#[derive(Debug)]
pub struct Message {
    originator: Address,
    recipients: Vec<Arc<Recipient>>,
    parts: Vec<Part>,
    headers: Vec<(String, String)>,
    encoding: Option<Encoding>,
    verp: bool,
    return_type: Option<ReturnType>,
    envelope_id: Option<String>,
    vmta: Option<String>,
    job_id: Option<String>,
    submitted: bool,
    last_error: Option<Error>,
}

impl Message {
    /// Creates a message with the given return-path address.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::EmailAddress`] message error if `originator`
    /// is not a plausible address.
    pub fn new(originator: impl Into<String>) -> Result<Self> {
        let originator = Address::new(originator)
            .map_err(|e| Origin::Message.error(Category::EmailAddress, e.to_string()))?;

        Ok(Self {
            originator,
            recipients: Vec::new(),
            parts: Vec::new(),
            headers: Vec::new(),
            encoding: None,
            verp: false,
            return_type: None,
            envelope_id: None,
            vmta: None,
            job_id: None,
            submitted: false,
            last_error: None,
        })
    }

    /// Returns the return-path address.
    #[must_use]
    pub const fn originator(&self) -> &Address {
        &self.originator
    }

    /// Returns the recipients in envelope order.
    #[must_use]
    pub fn recipients(&self) -> &[Arc<Recipient>] {
        &self.recipients
    }

    /// Returns the body parts in the order they were opened.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns the headers added by the library, e.g. `Date`.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the requested encoding; `None` leaves it to the acceptor.
    #[must_use]
    pub const fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// Returns true if VERP rewriting is requested.
    #[must_use]
    pub const fn verp(&self) -> bool {
        self.verp
    }

    /// Returns the bounce return type.
    #[must_use]
    pub const fn return_type(&self) -> Option<ReturnType> {
        self.return_type
    }

    /// Returns the DSN envelope identifier.
    #[must_use]
    pub fn envelope_id(&self) -> Option<&str> {
        self.envelope_id.as_deref()
    }

    /// Returns the virtual MTA routing hint.
    #[must_use]
    pub fn vmta(&self) -> Option<&str> {
        self.vmta.as_deref()
    }

    /// Returns the job tracking token.
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Returns true once the message was handed to a connection.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Returns the error raised by the last mutating call, if it failed.
    #[must_use]
    pub const fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Returns true if any part carries merge placeholders.
    #[must_use]
    pub fn has_merge_data(&self) -> bool {
        self.parts.iter().any(Part::has_merge_data)
    }

    /// Sets the body encoding.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error after submission.
    pub fn set_encoding(&mut self, encoding: Option<Encoding>) -> Result<()> {
        let result = self.ensure_mutable().map(|()| self.encoding = encoding);
        self.record(result)
    }

    /// Enables or disables VERP.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error after submission.
    pub fn set_verp(&mut self, verp: bool) -> Result<()> {
        let result = self.ensure_mutable().map(|()| self.verp = verp);
        self.record(result)
    }

    /// Sets the bounce return type.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error after submission.
    pub fn set_return_type(&mut self, return_type: Option<ReturnType>) -> Result<()> {
        let result = self
            .ensure_mutable()
            .map(|()| self.return_type = return_type);
        self.record(result)
    }

    /// Sets the DSN envelope identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Category::IllegalState`] after submission, or
    /// [`Category::IllegalArgument`] for an empty value or one with control
    /// characters.
    pub fn set_envelope_id(&mut self, envelope_id: impl Into<String>) -> Result<()> {
        let value = envelope_id.into();
        let result = self
            .ensure_mutable()
            .and_then(|()| validate_token("envelope id", &value))
            .map(|()| self.envelope_id = Some(value));
        self.record(result)
    }

    /// Sets the virtual MTA routing hint, sent as `x-virtual-mta`.
    ///
    /// # Errors
    ///
    /// Same as [`Message::set_envelope_id`].
    pub fn set_vmta(&mut self, vmta: impl Into<String>) -> Result<()> {
        let value = vmta.into();
        let result = self
            .ensure_mutable()
            .and_then(|()| validate_token("virtual MTA", &value))
            .map(|()| self.vmta = Some(value));
        self.record(result)
    }

    /// Sets the job tracking token, sent as `x-job`.
    ///
    /// # Errors
    ///
    /// Same as [`Message::set_envelope_id`].
    pub fn set_job_id(&mut self, job_id: impl Into<String>) -> Result<()> {
        let value = job_id.into();
        let result = self
            .ensure_mutable()
            .and_then(|()| validate_token("job id", &value))
            .map(|()| self.job_id = Some(value));
        self.record(result)
    }

    /// Opens a new body part; later data goes into it.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error after submission.
    pub fn begin_part(&mut self, number: u32) -> Result<()> {
        let result = self
            .ensure_mutable()
            .map(|()| self.parts.push(Part::new(number)));
        self.record(result)
    }

    /// Appends raw bytes to the current part.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error if no part is open or the
    /// message was submitted.
    pub fn add_data(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let segment = Segment::Data(data.as_ref().to_vec());
        let result = self.append(segment);
        self.record(result)
    }

    /// Appends bytes containing `{{name}}` placeholders to the current part.
    ///
    /// # Errors
    ///
    /// Same as [`Message::add_data`].
    pub fn add_merge_data(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let segment = Segment::Merge(data.as_ref().to_vec());
        let result = self.append(segment);
        self.record(result)
    }

    /// Appends a `Date:` header with the current time in RFC 5322 format.
    ///
    /// Calling it twice adds two headers.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error after submission.
    pub fn add_date_header(&mut self) -> Result<()> {
        let result = self.ensure_mutable().map(|()| {
            let now = chrono::Local::now().to_rfc2822();
            self.headers.push(("Date".to_string(), now));
        });
        self.record(result)
    }

    /// Appends a recipient; the message and the caller share it.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error after submission.
    pub fn add_recipient(&mut self, recipient: Arc<Recipient>) -> Result<()> {
        let result = self
            .ensure_mutable()
            .map(|()| self.recipients.push(recipient));
        self.record(result)
    }

    /// Renders all parts with merge placeholders left as written.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        self.render_with(&HashMap::new())
    }

    /// Renders all parts personalized for `recipient`.
    ///
    /// Placeholders the recipient has no variable for stay verbatim.
    #[must_use]
    pub fn render_for(&self, recipient: &Recipient) -> Vec<u8> {
        recipient.with_variables(|variables| self.render_with(variables))
    }

    fn render_with(&self, variables: &HashMap<String, String>) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.parts.iter().map(Part::len).sum());
        for part in &self.parts {
            part.render_into(variables, &mut out);
        }
        out
    }

    /// Builds the content sent after `DATA`, personalized when `recipient`
    /// is given.
    pub(crate) fn content_for(&self, recipient: Option<&Recipient>) -> Result<Vec<u8>> {
        let rendered = recipient.map_or_else(|| self.render(), |r| self.render_for(r));
        body::compose(self, &rendered)
    }

    /// Checks that the message can be handed to a connection.
    pub(crate) fn check_submittable(&mut self) -> Result<()> {
        let result = self.ensure_mutable().and_then(|()| {
            if self.recipients.is_empty() {
                Err(Origin::Message.error(Category::IllegalArgument, "message has no recipients"))
            } else if self.parts.is_empty() {
                Err(Origin::Message.error(Category::IllegalArgument, "message has no body parts"))
            } else {
                Ok(())
            }
        });
        self.record(result)
    }

    /// Freezes the message and locks its recipients.
    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
        for recipient in &self.recipients {
            recipient.lock();
        }
    }

    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_error = result.as_ref().err().cloned();
        result
    }

    fn append(&mut self, segment: Segment) -> Result<()> {
        self.ensure_mutable()?;
        match self.parts.last_mut() {
            Some(part) => {
                part.push(segment);
                Ok(())
            }
            None => Err(Origin::Message.error(
                Category::IllegalState,
                "no part is open; call begin_part first",
            )),
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.submitted {
            return Err(Origin::Message.error(
                Category::IllegalState,
                "message has already been submitted",
            ));
        }
        Ok(())
    }
}

fn validate_token(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Origin::Message.error(
            Category::IllegalArgument,
            format!("{what} cannot be empty"),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(Origin::Message.error(
            Category::IllegalArgument,
            format!("{what} contains control characters"),
        ));
    }
    Ok(())
}
