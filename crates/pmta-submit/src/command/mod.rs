//! Acceptor command builder.

use std::fmt::Write as _;

use crate::types::{Address, AuthMechanism, Notify};

/// ESMTP parameters appended to `MAIL FROM`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailParams {
    /// `BODY=` value (`7BIT`, `8BITMIME`).
    pub body: Option<&'static str>,
    /// `SIZE=` value.
    pub size: Option<usize>,
    /// `RET=` value (`HDRS`, `FULL`).
    pub ret: Option<&'static str>,
    /// `ENVID=` value, xtext-encoded on serialization.
    pub envid: Option<String>,
    /// VERP keyword as advertised by the acceptor.
    pub verp: Option<String>,
}

/// Command sent to the acceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// Bare SASL continuation line
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Return-path address
        from: Address,
        /// ESMTP parameters
        params: MailParams,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
        /// `NOTIFY=` parameter, sent only when set
        notify: Option<Notify>,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = String::new();

        match self {
            Self::Helo { hostname } => {
                buf.push_str("HELO ");
                buf.push_str(hostname);
            }
            Self::Ehlo { hostname } => {
                buf.push_str("EHLO ");
                buf.push_str(hostname);
            }
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                buf.push_str("AUTH ");
                buf.push_str(mechanism.as_str());
                if let Some(resp) = initial_response {
                    buf.push(' ');
                    buf.push_str(resp);
                }
            }
            Self::AuthResponse(resp) => buf.push_str(resp),
            Self::MailFrom { from, params } => {
                let _ = write!(buf, "MAIL FROM:<{from}>");
                if let Some(body) = params.body {
                    let _ = write!(buf, " BODY={body}");
                }
                if let Some(size) = params.size {
                    let _ = write!(buf, " SIZE={size}");
                }
                if let Some(ret) = params.ret {
                    let _ = write!(buf, " RET={ret}");
                }
                if let Some(envid) = &params.envid {
                    let _ = write!(buf, " ENVID={}", xtext(envid));
                }
                if let Some(verp) = &params.verp {
                    buf.push(' ');
                    buf.push_str(verp);
                }
            }
            Self::RcptTo { to, notify } => {
                let _ = write!(buf, "RCPT TO:<{to}>");
                if let Some(notify) = notify {
                    let _ = write!(buf, " NOTIFY={}", notify.to_param());
                }
            }
            Self::Data => buf.push_str("DATA"),
            Self::Rset => buf.push_str("RSET"),
            Self::Noop => buf.push_str("NOOP"),
            Self::Quit => buf.push_str("QUIT"),
        }

        buf.push_str("\r\n");
        buf.into_bytes()
    }

    /// Returns the command verb, for logging without leaking credentials.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::Auth { .. } => "AUTH",
            Self::AuthResponse(_) => "AUTH-RESPONSE",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }
}

/// Encodes a value as RFC 3461 xtext.
#[must_use]
pub fn xtext(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'!'..=b'~' if byte != b'+' && byte != b'=' => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "+{byte:02X}");
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_auth_plain() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn test_mail_from_simple() {
        let cmd = Command::MailFrom {
            from: addr("bounce@example.com"),
            params: MailParams::default(),
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<bounce@example.com>\r\n");
    }

    #[test]
    fn test_mail_from_with_params() {
        let cmd = Command::MailFrom {
            from: addr("bounce@example.com"),
            params: MailParams {
                body: Some("8BITMIME"),
                size: Some(12345),
                ret: Some("HDRS"),
                envid: Some("job 7=a".to_string()),
                verp: Some("XVERP".to_string()),
            },
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<bounce@example.com> BODY=8BITMIME SIZE=12345 RET=HDRS ENVID=job+207+3Da XVERP\r\n"
        );
    }

    #[test]
    fn test_rcpt_to_with_notify() {
        let cmd = Command::RcptTo {
            to: addr("c@d.com"),
            notify: Some(Notify::ALWAYS),
        };
        assert_eq!(
            cmd.serialize(),
            b"RCPT TO:<c@d.com> NOTIFY=SUCCESS,FAILURE,DELAY\r\n"
        );
    }

    #[test]
    fn test_rcpt_to_without_notify() {
        let cmd = Command::RcptTo {
            to: addr("c@d.com"),
            notify: None,
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<c@d.com>\r\n");
    }

    #[test]
    fn test_simple_verbs() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
    }

    #[test]
    fn test_verb_hides_credentials() {
        let cmd = Command::AuthResponse("c2VjcmV0".to_string());
        assert_eq!(cmd.verb(), "AUTH-RESPONSE");
    }

    #[test]
    fn test_xtext_escapes_plus_equals_and_controls() {
        assert_eq!(xtext("abc"), "abc");
        assert_eq!(xtext("a+b=c"), "a+2Bb+3Dc");
        assert_eq!(xtext("a b"), "a+20b");
    }
}
