//! # pmta-submit
//!
//! An async client for submitting mail to a PowerMTA-compatible acceptor.
//!
//! ## Features
//!
//! - **Structured errors**: every failure carries its origin (connection,
//!   recipient, message) and one of seven categories
//! - **Per-recipient outcomes**: partial acceptance is a result, not an error
//! - **Mail merge**: `{{name}}` placeholders rendered per recipient
//! - **Extensions**: SIZE, 8BITMIME, DSN (`NOTIFY`, `RET`, `ENVID`), VERP
//! - **Authentication**: PLAIN and LOGIN
//!
//! ## Quick Start
//!
//! ```no_run
//! use pmta_submit::{Connection, Message, Notify, Recipient};
//!
//! #[tokio::main]
//! async fn main() -> pmta_submit::Result<()> {
//!     let connection = Connection::open("127.0.0.1", 25, None, None).await?;
//!
//!     let rcpt = Recipient::shared("ann@example.org")?;
//!     rcpt.set_notify(Notify::FAILURE | Notify::DELAY)?;
//!
//!     let mut message = Message::new("bounces@example.com")?;
//!     message.add_date_header()?;
//!     message.begin_part(1)?;
//!     message.add_data("Subject: Hello\r\n\r\nHi there.\r\n")?;
//!     message.add_recipient(rcpt)?;
//!
//!     let report = connection.submit_message(&mut message).await?;
//!     for status in report.statuses() {
//!         println!("{}: {:?}", status.address, status.outcome);
//!     }
//!
//!     connection.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐  establish()  ┌───────────┐  close() / I/O error  ┌────────┐
//! │ Disconnected │ ────────────→ │ Connected │ ────────────────────→ │ Closed │
//! └──────────────┘               └───────────┘                       └────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command builders
//! - [`connection`]: Sessions, configuration, and submission reports
//! - [`message`]: Messages, parts, and merge rendering
//! - [`parser`]: Reply parser
//! - [`types`]: Core types (addresses, notify flags, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod message;
pub mod parser;
mod recipient;
pub mod types;

pub use connection::{
    Connection, ConnectionConfig, Credentials, Outcome, RecipientStatus, ServerInfo, State,
    SubmitReport,
};
pub use error::{Category, Error, Origin, Result};
pub use message::{Encoding, Message, ReturnType};
pub use recipient::Recipient;
pub use types::{Address, Notify, Reply, ReplyCode};
