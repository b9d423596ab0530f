//! Delivery status notification flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Per-recipient DSN request, as a bitset.
///
/// The empty set means [`Notify::NEVER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Notify(u8);

impl Notify {
    /// Never send a notification.
    pub const NEVER: Self = Self(0);
    /// Notify on successful delivery.
    pub const SUCCESS: Self = Self(0b001);
    /// Notify on delivery failure.
    pub const FAILURE: Self = Self(0b010);
    /// Notify when delivery is delayed.
    pub const DELAY: Self = Self(0b100);
    /// Success, failure and delay.
    pub const ALWAYS: Self = Self(0b111);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds flags from raw bits, dropping unknown bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALWAYS.0)
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no notification is requested.
    #[must_use]
    pub const fn is_never(self) -> bool {
        self.0 == 0
    }

    /// Returns the value of the `NOTIFY=` ESMTP parameter (RFC 3461).
    #[must_use]
    pub fn to_param(self) -> String {
        if self.is_never() {
            return "NEVER".to_string();
        }

        let mut keywords = Vec::with_capacity(3);
        if self.contains(Self::SUCCESS) {
            keywords.push("SUCCESS");
        }
        if self.contains(Self::FAILURE) {
            keywords.push("FAILURE");
        }
        if self.contains(Self::DELAY) {
            keywords.push("DELAY");
        }
        keywords.join(",")
    }
}

impl BitOr for Notify {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Notify {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Notify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}
