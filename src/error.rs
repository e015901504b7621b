//! Error types for the mbox locking subsystem.
//!
//! Uses thiserror for derive macros. Timeouts are deliberately *not* errors:
//! contention is an expected operating condition and is reported through
//! [`AcquireOutcome::TimedOut`](crate::AcquireOutcome) instead. Contract
//! violations by the caller (upgrading a shared lock, releasing with a stale
//! lock id) are assertions, not error values.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// Invalid lock configuration. Fatal at startup: a process with a broken
    /// method list must not attempt any lock.
    #[error("invalid lock configuration: {0}")]
    Config(String),

    /// A stat/open/lock syscall failed for a reason other than contention.
    #[error("{op} failed for '{}': {source}", path.display())]
    Io {
        /// Which operation failed (e.g. "stat", "fcntl").
        op: &'static str,
        /// The mailbox or marker path involved.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        LockError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
