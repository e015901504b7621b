//! Defaults for lock settings.
//!
//! The defaults mirror the traditional mbox conventions: readers take only a
//! POSIX record lock, writers additionally take the dotlock so that agents
//! which only speak the dotlock protocol still see the mailbox as busy.

/// Default method list for shared (read) access.
pub const DEFAULT_READ_LOCK_METHODS: &str = "fcntl";

/// Default method list for exclusive (write) access.
pub const DEFAULT_WRITE_LOCK_METHODS: &str = "dotlock fcntl";

/// Default overall wait timeout, in seconds.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 10 * 60;

/// Default dotlock staleness threshold: how long the mailbox must be
/// unchanged before an existing marker is suspected of being abandoned.
pub const DEFAULT_DOTLOCK_CHANGE_TIMEOUT_SECS: u64 = 5 * 60;

// Default value functions for serde
pub(crate) fn default_read_locks() -> String {
    DEFAULT_READ_LOCK_METHODS.to_string()
}
pub(crate) fn default_write_locks() -> String {
    DEFAULT_WRITE_LOCK_METHODS.to_string()
}
pub(crate) fn default_lock_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}
pub(crate) fn default_dotlock_change_timeout_secs() -> u64 {
    DEFAULT_DOTLOCK_CHANGE_TIMEOUT_SECS
}
