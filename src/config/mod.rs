//! Lock configuration for the mailbox locking subsystem.
//!
//! An external configuration loader supplies method lists and timeouts as
//! plain strings and integers ([`LockSettings`]); this module resolves them
//! once into a validated, immutable [`LockConfig`] that is constructor
//! injected into every [`MailboxLock`](crate::MailboxLock). Invalid settings
//! are a fatal startup condition, never a runtime error.

mod model;
pub mod types;

#[cfg(test)]
mod tests;

pub use model::{LockConfig, LockSettings};
