//! Envelope address type.

/// Reasons an address is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The address is empty.
    #[error("Address cannot be empty")]
    Empty,
    /// No `@` separator.
    #[error("Address must contain @")]
    MissingAt,
    /// More than one `@`.
    #[error("Address must have exactly one @")]
    MultipleAt,
    /// Local or domain part is empty.
    #[error("Local and domain parts cannot be empty")]
    EmptyPart,
    /// A character that would corrupt the envelope line.
    #[error("Address contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Email address used in the SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a plausible `local@domain`.
    pub fn new(addr: impl Into<String>) -> Result<Self, AddressError> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    fn validate(addr: &str) -> Result<(), AddressError> {
        if addr.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(c) = addr
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(AddressError::InvalidCharacter(c));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(AddressError::MissingAt);
        };

        if domain.contains('@') {
            return Err(AddressError::MultipleAt);
        }

        if local.is_empty() || domain.is_empty() {
            return Err(AddressError::EmptyPart);
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.local_part(), "user");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert_eq!(
            Address::new("userexample.com"),
            Err(AddressError::MissingAt)
        );
    }

    #[test]
    fn test_invalid_address_empty() {
        assert_eq!(Address::new(""), Err(AddressError::Empty));
    }

    #[test]
    fn test_invalid_address_empty_local() {
        assert_eq!(Address::new("@example.com"), Err(AddressError::EmptyPart));
    }

    #[test]
    fn test_invalid_address_empty_domain() {
        assert_eq!(Address::new("user@"), Err(AddressError::EmptyPart));
    }

    #[test]
    fn test_invalid_address_two_ats() {
        assert_eq!(Address::new("a@b@c"), Err(AddressError::MultipleAt));
    }

    #[test]
    fn test_invalid_address_envelope_characters() {
        assert_eq!(
            Address::new("a>@b.com"),
            Err(AddressError::InvalidCharacter('>'))
        );
        assert_eq!(
            Address::new("a@b.com\r\nRSET"),
            Err(AddressError::InvalidCharacter('\r'))
        );
    }

    proptest! {
        #[test]
        fn local_at_domain_is_accepted(
            local in "[a-zA-Z0-9._+-]{1,24}",
            domain in "[a-z0-9-]{1,16}\\.[a-z]{2,6}",
        ) {
            let addr = format!("{local}@{domain}");
            prop_assert!(Address::new(addr).is_ok());
        }

        #[test]
        fn missing_at_is_rejected(text in "[a-zA-Z0-9.]{0,32}") {
            prop_assert!(Address::new(text).is_err());
        }
    }
}
