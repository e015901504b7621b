//! The lock method registry.
//!
//! A fixed, ordered catalogue of the primitive locking protocols this crate
//! knows how to combine. The set is closed on purpose: every process touching
//! a given mailbox must agree on the methods and their relative order, so
//! user-extensible methods would be an operational hazard, not a feature.

use crate::error::{LockError, Result};
use std::fmt;

/// One primitive locking protocol.
///
/// The dotlock is the slow courtesy protocol and conventionally sorts before
/// the kernel-mediated methods; it is the only method with a staleness story,
/// since the kernel drops its own locks when a holder dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMethod {
    /// `<mailbox>.lock` marker file, honored by convention.
    Dotlock,
    /// POSIX record lock over the whole file (`fcntl(F_SETLK)`).
    Fcntl,
    /// BSD whole-descriptor lock (`flock(2)`), shared or exclusive.
    Flock,
    /// Exclusive section lock (`lockf(3)`), no shared mode.
    Lockf,
}

impl LockMethod {
    /// Number of methods in the registry.
    pub const COUNT: usize = 4;

    /// All methods in registry order.
    pub const ALL: [LockMethod; Self::COUNT] = [
        LockMethod::Dotlock,
        LockMethod::Fcntl,
        LockMethod::Flock,
        LockMethod::Lockf,
    ];

    /// Configuration name of this method.
    pub fn name(self) -> &'static str {
        match self {
            LockMethod::Dotlock => "dotlock",
            LockMethod::Fcntl => "fcntl",
            LockMethod::Flock => "flock",
            LockMethod::Lockf => "lockf",
        }
    }

    /// Look a method up by its configuration name (case insensitive).
    pub fn from_name(name: &str) -> Option<LockMethod> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    /// Whether this method is usable on the current platform.
    ///
    /// The kernel-mediated methods need the unix locking syscalls; the
    /// dotlock only needs a filesystem.
    pub fn is_supported(self) -> bool {
        match self {
            LockMethod::Dotlock => true,
            LockMethod::Fcntl | LockMethod::Flock | LockMethod::Lockf => cfg!(unix),
        }
    }

    fn index(self) -> usize {
        match self {
            LockMethod::Dotlock => 0,
            LockMethod::Fcntl => 1,
            LockMethod::Flock => 2,
            LockMethod::Lockf => 3,
        }
    }
}

impl fmt::Display for LockMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a space-separated method list from configuration.
///
/// `key` names the setting for error messages. Unknown names, methods not
/// supported on this platform, and duplicates are all configuration errors;
/// an empty list is allowed.
pub fn parse_method_list(list: &str, key: &str) -> Result<Vec<LockMethod>> {
    let mut methods = Vec::new();
    for word in list.split_whitespace() {
        let method = LockMethod::from_name(word)
            .ok_or_else(|| LockError::Config(format!("{key}: unknown lock method '{word}'")))?;
        if !method.is_supported() {
            return Err(LockError::Config(format!(
                "{key}: lock method '{word}' is not supported on this platform"
            )));
        }
        if methods.contains(&method) {
            return Err(LockError::Config(format!(
                "{key}: duplicated lock method '{word}'"
            )));
        }
        methods.push(method);
    }
    Ok(methods)
}

/// Per-method boolean state, indexed by [`LockMethod`].
///
/// A typed wrapper over a fixed array so per-method bookkeeping can never go
/// out of bounds or be indexed with the wrong integer.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MethodFlags([bool; LockMethod::COUNT]);

impl MethodFlags {
    pub fn get(&self, method: LockMethod) -> bool {
        self.0[method.index()]
    }

    pub fn set(&mut self, method: LockMethod, value: bool) {
        self.0[method.index()] = value;
    }

    pub fn fill(&mut self, value: bool) {
        self.0 = [value; LockMethod::COUNT];
    }
}
