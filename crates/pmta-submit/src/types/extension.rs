//! ESMTP extension types.

/// Extensions discovered from the acceptor's EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// AUTH - Authentication
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// DSN - Delivery status notifications (`NOTIFY`, `RET`, `ENVID`)
    Dsn,
    /// VERP / XVERP - Variable envelope return path, with the advertised keyword
    Verp(String),
    /// PIPELINING - Command pipelining
    Pipelining,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Self::Unknown(line.to_string());
        }

        let keyword = parts[0].to_uppercase();
        match keyword.as_str() {
            "AUTH" => {
                let mechanisms = parts[1..]
                    .iter()
                    .filter_map(|m| AuthMechanism::parse(m))
                    .collect();
                Self::Auth(mechanisms)
            }
            "SIZE" => {
                let size = parts
                    .get(1)
                    .and_then(|s| s.parse().ok())
                    .filter(|&size| size > 0);
                Self::Size(size)
            }
            "8BITMIME" => Self::EightBitMime,
            "DSN" => Self::Dsn,
            "VERP" | "XVERP" => Self::Verp(keyword),
            "PIPELINING" => Self::Pipelining,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism the client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn parse_auth_keeps_supported_mechanisms() {
        let ext = Extension::parse("AUTH CRAM-MD5 PLAIN LOGIN");
        assert_eq!(
            ext,
            Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login])
        );
    }

    #[test]
    fn parse_size_with_value() {
        assert_eq!(
            Extension::parse("SIZE 52428800"),
            Extension::Size(Some(52_428_800))
        );
    }

    #[test]
    fn parse_size_zero_means_unlimited() {
        assert_eq!(Extension::parse("SIZE 0"), Extension::Size(None));
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
    }

    #[test]
    fn parse_dsn_and_8bitmime() {
        assert_eq!(Extension::parse("dsn"), Extension::Dsn);
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
    }

    #[test]
    fn parse_verp_keeps_keyword() {
        assert_eq!(
            Extension::parse("XVERP"),
            Extension::Verp("XVERP".to_string())
        );
        assert_eq!(
            Extension::parse("verp"),
            Extension::Verp("VERP".to_string())
        );
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            Extension::parse("XACK ON"),
            Extension::Unknown("XACK ON".to_string())
        );
        assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
    }

    #[test]
    fn mechanism_round_trip_names() {
        assert_eq!(AuthMechanism::parse("plain"), Some(AuthMechanism::Plain));
        assert_eq!(AuthMechanism::Login.as_str(), "LOGIN");
        assert_eq!(AuthMechanism::parse("XOAUTH2"), None);
    }
}
