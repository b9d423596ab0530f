//! Acceptor reply types.

/// Reply from the acceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Returns the code followed by the message, as the acceptor sent it.
    #[must_use]
    pub fn describe(&self) -> String {
        let text = self.message.join(" ");
        if text.is_empty() {
            self.code.to_string()
        } else {
            format!("{} {text}", self.code)
        }
    }
}

/// Reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Leading digit: 2 done, 3 more input, 4 try later, 5 refused.
    const fn class(self) -> u16 {
        self.0 / 100
    }

    /// 2xx: the acceptor completed the request.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// 3xx: the acceptor wants more input (`354`, `334`).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.class() == 3
    }

    /// 4xx: refused for now; a later retry may succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class() == 4
    }

    /// 5xx: refused for good.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class() == 5
    }

    /// Returns true if the code reports an authentication problem.
    #[must_use]
    pub const fn is_auth_failure(self) -> bool {
        matches!(self.0, 454 | 530 | 534 | 535 | 538)
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

// Codes the submission flow branches on
impl ReplyCode {
    /// 220 greeting
    pub const SERVICE_READY: Self = Self(220);
    /// 221 reply to `QUIT`
    pub const CLOSING: Self = Self(221);
    /// 235 credentials accepted
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 accepted
    pub const OK: Self = Self(250);
    /// 334 SASL challenge
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 send the content
    pub const START_DATA: Self = Self(354);
    /// 421 acceptor shutting down or overloaded
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 500 command not understood, triggers the `HELO` fallback
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 502 command not implemented, triggers the `HELO` fallback
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 535 credentials refused
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 recipient refused
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
            assert!(!ReplyCode::OK.is_permanent());
        }

        #[test]
        fn auth_failures() {
            assert!(ReplyCode::AUTH_FAILED.is_auth_failure());
            assert!(ReplyCode::new(530).is_auth_failure());
            assert!(!ReplyCode::MAILBOX_UNAVAILABLE.is_auth_failure());
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ReplyCode::OK), "250");
            assert_eq!(format!("{}", ReplyCode::SYNTAX_ERROR), "500");
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn describe_joins_code_and_lines() {
            let reply = Reply::new(
                ReplyCode::MAILBOX_UNAVAILABLE,
                vec!["5.1.1 <c@d.com>".to_string(), "user unknown".to_string()],
            );
            assert_eq!(reply.describe(), "550 5.1.1 <c@d.com> user unknown");
        }

        #[test]
        fn describe_without_text() {
            let reply = Reply::new(ReplyCode::OK, vec![String::new()]);
            assert_eq!(reply.describe(), "250");
        }

        #[test]
        fn message_text_multiple_lines() {
            let reply = Reply::new(
                ReplyCode::SERVICE_READY,
                vec!["pmta.example.com ESMTP".to_string(), "ready".to_string()],
            );
            assert_eq!(reply.message_text(), "pmta.example.com ESMTP\nready");
        }

        #[test]
        fn transient_vs_permanent() {
            let busy = Reply::new(ReplyCode::new(451), vec!["try later".to_string()]);
            assert!(busy.is_transient_error());
            assert!(!busy.is_permanent_error());
        }
    }
}
