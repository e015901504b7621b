//! Settings struct and resolved configuration.

use super::types::*;
use crate::error::{LockError, Result};
use crate::method::{LockMethod, parse_method_list};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw lock settings as supplied by an external configuration loader.
///
/// All fields are plain strings/integers so any configuration frontend can
/// produce them. Unknown fields in a deserialized document are ignored for
/// forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Ordered, space-separated method names for shared (read) access.
    #[serde(default = "default_read_locks")]
    pub read_locks: String,

    /// Ordered, space-separated method names for exclusive (write) access.
    /// Must contain `read_locks` as an order-preserving subsequence.
    #[serde(default = "default_write_locks")]
    pub write_locks: String,

    /// Overall wait timeout in seconds; `0` means never wait (every
    /// contended acquire times out immediately).
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Seconds the mailbox must be unchanged before an existing dotlock is
    /// considered a staleness candidate.
    #[serde(default = "default_dotlock_change_timeout_secs")]
    pub dotlock_change_timeout_secs: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            read_locks: default_read_locks(),
            write_locks: default_write_locks(),
            lock_timeout_secs: default_lock_timeout_secs(),
            dotlock_change_timeout_secs: default_dotlock_change_timeout_secs(),
        }
    }
}

/// Resolved, immutable lock configuration.
///
/// Built once per process from [`LockSettings`] and passed by reference to
/// every lock operation. Resolution validates the method lists, so a
/// constructed `LockConfig` is always internally consistent.
#[derive(Debug, Clone)]
pub struct LockConfig {
    shared_methods: Vec<LockMethod>,
    exclusive_methods: Vec<LockMethod>,
    wait_timeout: Duration,
    stale_threshold: Duration,
}

impl LockConfig {
    /// Resolve raw settings into a validated configuration.
    ///
    /// Unknown method names, methods unavailable on this platform,
    /// duplicates, and a shared list that is not an order-preserving
    /// subsequence of the exclusive list are all fatal configuration errors.
    pub fn resolve(settings: &LockSettings) -> Result<Self> {
        let shared_methods = parse_method_list(&settings.read_locks, "read_locks")?;
        let exclusive_methods = parse_method_list(&settings.write_locks, "write_locks")?;
        validate_ordering(&shared_methods, &exclusive_methods)?;
        Ok(Self {
            shared_methods,
            exclusive_methods,
            wait_timeout: Duration::from_secs(settings.lock_timeout_secs),
            stale_threshold: Duration::from_secs(settings.dotlock_change_timeout_secs),
        })
    }

    /// Methods used for shared access, in acquisition order.
    pub fn shared_methods(&self) -> &[LockMethod] {
        &self.shared_methods
    }

    /// Methods used for exclusive access, in acquisition order.
    pub fn exclusive_methods(&self) -> &[LockMethod] {
        &self.exclusive_methods
    }

    /// Overall wait timeout for one acquire.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Dotlock staleness threshold.
    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        // Built directly rather than through resolve() so the default is
        // infallible.
        Self {
            shared_methods: vec![LockMethod::Fcntl],
            exclusive_methods: vec![LockMethod::Dotlock, LockMethod::Fcntl],
            wait_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            stale_threshold: Duration::from_secs(DEFAULT_DOTLOCK_CHANGE_TIMEOUT_SECS),
        }
    }
}

/// Check that the exclusive list contains the shared list as an
/// order-preserving subsequence, starting from its first element.
///
/// Walking both lists in lockstep, every shared method must be matched before
/// the exclusive list is exhausted. Two processes whose lists disagree on
/// relative order can deadlock or bypass each other entirely, so a mismatch
/// within one process's own settings is rejected outright.
fn validate_ordering(shared: &[LockMethod], exclusive: &[LockMethod]) -> Result<()> {
    let mut remaining = shared.iter();
    let mut next = remaining.next();
    for method in exclusive {
        if next == Some(method) {
            next = remaining.next();
        }
    }
    if next.is_some() {
        return Err(LockError::Config(
            "read/write lock lists are inconsistent: lock ordering must be the same in both, \
             and write_locks must contain every method in read_locks"
                .to_string(),
        ));
    }
    Ok(())
}
