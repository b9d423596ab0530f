//! Per-recipient submission outcomes.

use crate::types::{Address, Reply, ReplyCode};

/// What the acceptor said about one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The recipient was accepted and the message content delivered for it.
    Accepted,
    /// The recipient, or its personalized transaction, was refused.
    Rejected {
        /// Reply code.
        code: ReplyCode,
        /// Reply text.
        message: String,
    },
}

impl Outcome {
    pub(crate) fn rejected(reply: &Reply) -> Self {
        Self::Rejected {
            code: reply.code,
            message: reply.message_text(),
        }
    }

    /// Returns true for [`Outcome::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Outcome for one recipient, in envelope order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientStatus {
    /// Recipient address.
    pub address: Address,
    /// Acceptor verdict.
    pub outcome: Outcome,
}

/// Result of a successful submission. At least one recipient was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    statuses: Vec<RecipientStatus>,
}

impl SubmitReport {
    pub(crate) fn push(&mut self, address: Address, outcome: Outcome) {
        self.statuses.push(RecipientStatus { address, outcome });
    }

    /// Returns every status in envelope order.
    #[must_use]
    pub fn statuses(&self) -> &[RecipientStatus] {
        &self.statuses
    }

    /// Iterates over accepted recipients.
    pub fn accepted(&self) -> impl Iterator<Item = &RecipientStatus> {
        self.statuses.iter().filter(|s| s.outcome.is_accepted())
    }

    /// Iterates over rejected recipients.
    pub fn rejected(&self) -> impl Iterator<Item = &RecipientStatus> {
        self.statuses.iter().filter(|s| !s.outcome.is_accepted())
    }

    /// Returns true if every recipient was accepted.
    #[must_use]
    pub fn all_accepted(&self) -> bool {
        self.statuses.iter().all(|s| s.outcome.is_accepted())
    }

    pub(crate) fn any_accepted(&self) -> bool {
        self.statuses.iter().any(|s| s.outcome.is_accepted())
    }
}
