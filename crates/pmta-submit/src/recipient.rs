//! Envelope recipients.
//!
//! A [`Recipient`] is shared between the caller and the [`Message`] it is
//! attached to, so it is handed around as `Arc<Recipient>` and keeps its
//! mutable state behind a lock. Once the message is submitted the recipient
//! is locked: the acceptor has seen its final shape.
//!
//! [`Message`]: crate::Message

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Category, Error, Origin, Result};
use crate::types::{Address, Notify};

#[derive(Debug, Default)]
struct State {
    notify: Option<Notify>,
    variables: HashMap<String, String>,
    locked: bool,
    last_error: Option<Error>,
}

/// One envelope recipient with its notification flags and merge variables.
#[derive(Debug)]
pub struct Recipient {
    address: Address,
    state: RwLock<State>,
}

impl Recipient {
    /// Creates a recipient for `address`.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::EmailAddress`] recipient error if the address
    /// is not a plausible `local@domain`.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = Address::new(address)
            .map_err(|e| Origin::Recipient.error(Category::EmailAddress, e.to_string()))?;

        Ok(Self {
            address,
            state: RwLock::new(State::default()),
        })
    }

    /// Creates a recipient already wrapped for sharing with a message.
    ///
    /// # Errors
    ///
    /// See [`Recipient::new`].
    pub fn shared(address: impl Into<String>) -> Result<Arc<Self>> {
        Self::new(address).map(Arc::new)
    }

    /// Returns the envelope address.
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the notification flags; [`Notify::NEVER`] until set.
    #[must_use]
    pub fn notify(&self) -> Notify {
        self.read().notify.unwrap_or_default()
    }

    /// Returns the flags only if [`Recipient::set_notify`] was called, so an
    /// untouched recipient leaves `NOTIFY=` to the acceptor's default.
    pub(crate) fn requested_notify(&self) -> Option<Notify> {
        self.read().notify
    }

    /// Returns a snapshot of the merge variables.
    #[must_use]
    pub fn variables(&self) -> HashMap<String, String> {
        self.read().variables.clone()
    }

    /// Returns one merge variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<String> {
        self.read().variables.get(name).cloned()
    }

    /// Returns true once the message carrying this recipient was submitted.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.read().locked
    }

    /// Returns the error raised by the last mutating call, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.read().last_error.clone()
    }

    /// Replaces the notification flags.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error if the recipient is locked.
    pub fn set_notify(&self, notify: Notify) -> Result<()> {
        let mut state = self.write();
        let result = Self::ensure_unlocked(&state);
        if result.is_ok() {
            state.notify = Some(notify);
        }
        Self::record(&mut state, result)
    }

    /// Defines a merge variable; a repeated name overwrites the old value.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalState`] error if the recipient is
    /// locked, or [`Category::IllegalArgument`] if `name` is empty.
    pub fn define_variable(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let mut state = self.write();
        let result = Self::ensure_unlocked(&state).and_then(|()| {
            if name.is_empty() {
                Err(Origin::Recipient.error(
                    Category::IllegalArgument,
                    "variable name cannot be empty",
                ))
            } else {
                Ok(())
            }
        });
        if result.is_ok() {
            state.variables.insert(name, value.into());
        }
        Self::record(&mut state, result)
    }

    /// Locks the recipient. Called when its message is submitted.
    pub(crate) fn lock(&self) {
        self.write().locked = true;
    }

    /// Runs `f` against the merge variables without cloning them.
    pub(crate) fn with_variables<R>(&self, f: impl FnOnce(&HashMap<String, String>) -> R) -> R {
        f(&self.read().variables)
    }

    fn ensure_unlocked(state: &State) -> Result<()> {
        if state.locked {
            return Err(Origin::Recipient.error(
                Category::IllegalState,
                "cannot modify a recipient of a submitted message",
            ));
        }
        Ok(())
    }

    fn record(state: &mut State, result: Result<()>) -> Result<()> {
        state.last_error = result.as_ref().err().cloned();
        result
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
