//! Cooperative, multi-method file locking for single-file mbox mailboxes.
//!
//! No single locking primitive is honored by every mail program, so a mailbox
//! is only safely locked by taking *several* locks, in a fixed order agreed
//! on by everyone touching the file. This crate implements that protocol:
//! ordered method lists resolved from configuration ([`config`]), the four
//! primitive methods (dotlock marker files plus the `fcntl`/`flock`/`lockf`
//! kernel locks), stale-dotlock detection backed by a kernel-lock liveness
//! probe, and a reference-counted manager ([`MailboxLock`]) with in-place
//! exclusive-to-shared downgrade.
//!
//! ```no_run
//! use mbox_lock::{LockConfig, LockMode, MailboxLock, NoopNotifier};
//!
//! # fn main() -> mbox_lock::Result<()> {
//! let mut lock = MailboxLock::open(LockConfig::default(), "/var/mail/alice");
//! if let Some(id) = lock
//!     .acquire(LockMode::Exclusive, &mut NoopNotifier)?
//!     .lock_id()
//! {
//!     // ... rewrite the mailbox ...
//!     lock.release(id)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dotlock;
pub mod error;
pub mod file;
pub mod locks;
pub mod method;
pub mod notify;
mod sys;

pub use config::{LockConfig, LockSettings};
pub use error::{LockError, Result};
pub use file::{FileIdentity, FsMailboxFile, MailboxFile};
pub use locks::{AcquireOutcome, LockId, LockMode, MailboxLock};
pub use method::LockMethod;
pub use notify::{FnNotifier, LockNotice, LockNotifier, NoopNotifier, NotifyDecision};
