//! Core envelope and protocol types.

mod address;
mod extension;
mod notify;
mod reply;

pub use address::{Address, AddressError};
pub use extension::{AuthMechanism, Extension};
pub use notify::Notify;
pub use reply::{Reply, ReplyCode};
