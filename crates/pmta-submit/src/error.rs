//! Error types for submission operations.
//!
//! Every fallible call returns a structured [`Error`] rather than a bare
//! status flag. The variant tells which component raised it, the
//! [`Category`] tells what kind of failure it was.

use std::fmt;
use std::io;

/// Result type alias for submission operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure category reported by the acceptor API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Allocation failed.
    OutOfMemory,
    /// Operation is not valid in the current lifecycle state.
    IllegalState,
    /// Malformed input not covered by a more specific category.
    IllegalArgument,
    /// Authentication or credential failure.
    Security,
    /// Transport failure: refused, reset, timed out.
    Io,
    /// The acceptor rejected the submission.
    Service,
    /// Malformed email address.
    EmailAddress,
}

impl Category {
    /// Returns the category name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutOfMemory => "out of memory",
            Self::IllegalState => "illegal state",
            Self::IllegalArgument => "illegal argument",
            Self::Security => "security",
            Self::Io => "I/O",
            Self::Service => "service",
            Self::EmailAddress => "email address",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Raised by a [`Connection`](crate::Connection).
    Connection,
    /// Raised by a [`Recipient`](crate::Recipient).
    Recipient,
    /// Raised by a [`Message`](crate::Message).
    Message,
}

impl Origin {
    /// Builds an error raised by this component.
    #[must_use]
    pub fn error(self, category: Category, message: impl Into<String>) -> Error {
        let message = message.into();
        match self {
            Self::Connection => Error::Connection { category, message },
            Self::Recipient => Error::Recipient { category, message },
            Self::Message => Error::Message { category, message },
        }
    }

    /// Builds an I/O error raised by this component.
    #[must_use]
    pub fn io(self, err: &io::Error) -> Error {
        let message = if err.kind() == io::ErrorKind::TimedOut {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        self.error(Category::Io, message)
    }
}

/// Submission error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Raised while connecting, authenticating, or talking to the acceptor.
    #[error("Connection error ({category}): {message}")]
    Connection {
        /// Failure category.
        category: Category,
        /// Human-readable description.
        message: String,
    },

    /// Raised by a recipient, or by the acceptor refusing every recipient.
    #[error("Recipient error ({category}): {message}")]
    Recipient {
        /// Failure category.
        category: Category,
        /// Human-readable description.
        message: String,
    },

    /// Raised while building a message, or by the acceptor refusing it.
    #[error("Message error ({category}): {message}")]
    Message {
        /// Failure category.
        category: Category,
        /// Human-readable description.
        message: String,
    },
}

impl Error {
    /// Returns the failure category.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Connection { category, .. }
            | Self::Recipient { category, .. }
            | Self::Message { category, .. } => *category,
        }
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Recipient { message, .. }
            | Self::Message { message, .. } => message,
        }
    }

    /// Returns the component that raised the error.
    #[must_use]
    pub const fn origin(&self) -> Origin {
        match self {
            Self::Connection { .. } => Origin::Connection,
            Self::Recipient { .. } => Origin::Recipient,
            Self::Message { .. } => Origin::Message,
        }
    }

    /// Returns true if this error was raised by a connection.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns true if this error was raised by a recipient.
    #[must_use]
    pub const fn is_recipient(&self) -> bool {
        matches!(self, Self::Recipient { .. })
    }

    /// Returns true if this error was raised by a message.
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(self, Self::Message { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn origin_builds_matching_variant() {
        let err = Origin::Recipient.error(Category::IllegalState, "locked");
        assert!(err.is_recipient());
        assert_eq!(err.origin(), Origin::Recipient);
        assert_eq!(err.category(), Category::IllegalState);
        assert_eq!(err.message(), "locked");
    }

    #[test]
    fn display_includes_category_and_message() {
        let err = Origin::Connection.error(Category::Io, "connection refused");
        assert_eq!(
            err.to_string(),
            "Connection error (I/O): connection refused"
        );
    }

    #[test]
    fn io_timeout_is_labelled() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "read");
        let err = Origin::Connection.io(&io_err);
        assert_eq!(err.category(), Category::Io);
        assert!(err.message().starts_with("timed out"));
    }

    #[test]
    fn errors_compare_by_value() {
        let a = Origin::Message.error(Category::Service, "554 rejected");
        let b = Origin::Message.error(Category::Service, "554 rejected");
        let c = Origin::Connection.error(Category::Service, "554 rejected");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
