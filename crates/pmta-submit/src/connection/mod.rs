//! Acceptor sessions.
//!
//! [`Connection`] is the public entry point. The layers below it are the
//! request/response [`Client`] and the timed [`AcceptorStream`].

mod client;
mod config;
mod report;
mod session;
mod stream;

pub use client::Client;
pub use config::{
    ConnectionConfig, ConnectionConfigBuilder, Credentials, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_HOST, DEFAULT_IO_TIMEOUT, DEFAULT_PORT,
};
pub use report::{Outcome, RecipientStatus, SubmitReport};
pub use session::{Connection, State};
pub use stream::{AcceptorStream, connect};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// Acceptor capabilities from the greeting and `EHLO` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Acceptor hostname from the greeting.
    pub hostname: String,
    /// Advertised extensions. Empty after a `HELO` fallback.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the acceptor advertises an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if `8BITMIME` is advertised, which enables `BODY=`.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Checks if `DSN` is advertised, which enables `NOTIFY`, `RET` and `ENVID`.
    #[must_use]
    pub fn supports_dsn(&self) -> bool {
        self.supports(&Extension::Dsn)
    }

    /// Checks if `SIZE` is advertised, with or without a limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Returns the keyword to append to `MAIL FROM` for VERP, if advertised.
    #[must_use]
    pub fn verp_keyword(&self) -> Option<&str> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Verp(keyword) => Some(keyword.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "mta.example.com".to_string(),
            extensions: lines.iter().map(|l| Extension::parse(l)).collect(),
        }
    }

    #[test]
    fn capabilities_from_ehlo_lines() {
        let info = info(&["SIZE 1000", "8BITMIME", "DSN", "XVERP", "AUTH LOGIN PLAIN"]);
        assert_eq!(info.max_message_size(), Some(1000));
        assert!(info.supports_size());
        assert!(info.supports_8bitmime());
        assert!(info.supports_dsn());
        assert_eq!(info.verp_keyword(), Some("XVERP"));
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::Plain]
        );
    }

    #[test]
    fn size_without_limit() {
        let info = info(&["SIZE"]);
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), None);
    }

    #[test]
    fn helo_fallback_has_no_capabilities() {
        let info = info(&[]);
        assert!(!info.supports_dsn());
        assert!(info.auth_mechanisms().is_empty());
        assert!(info.verp_keyword().is_none());
    }
}
