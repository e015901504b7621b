//! Lock modes, identifiers, and internal state enums.

/// Requested access level for a lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Concurrent readers allowed.
    Shared,
    /// Sole access for mutation.
    Exclusive,
}

/// Ticket returned by a successful acquire, required by the matching release.
///
/// The value encodes both an epoch and the mode: the manager advances its
/// epoch by two every time the mailbox transitions from unlocked to locked,
/// shared grants get the even epoch value and exclusive grants the odd one.
/// A release presented with an id from a previous epoch is a use-after-free
/// style bug in the caller and panics rather than corrupting the refcounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockId(pub(crate) u32);

impl LockId {
    /// Whether this id was granted for exclusive access.
    pub fn is_exclusive(self) -> bool {
        self.0 & 1 == 1
    }

    /// Raw id value, for logging.
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Result of an acquire attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The lock is held; present the id to `release`.
    Granted(LockId),
    /// The wait deadline passed (or the notifier aborted) with the lock still
    /// contended. Nothing is held.
    TimedOut,
}

impl AcquireOutcome {
    /// The granted id, if any.
    pub fn lock_id(self) -> Option<LockId> {
        match self {
            AcquireOutcome::Granted(id) => Some(id),
            AcquireOutcome::TimedOut => None,
        }
    }
}

/// What a lock-list walk is asked to do with each method.
///
/// Distinct from [`LockMode`] because release walks are also expressed as a
/// direction through the same per-method code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Shared,
    Exclusive,
    Unlock,
}

impl From<LockMode> for Direction {
    fn from(mode: LockMode) -> Self {
        match mode {
            LockMode::Shared => Direction::Shared,
            LockMode::Exclusive => Direction::Exclusive,
        }
    }
}

/// Outcome of one lock-list walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockOutcome {
    Granted,
    TimedOut,
}

/// What the most recent liveness probe concluded about a dotlock holder.
///
/// Cached across polls of the same transition so a holder proven dead is not
/// re-probed before every override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Staleness {
    Unknown,
    Fresh,
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_id_parity_encodes_mode() {
        assert!(!LockId(2).is_exclusive());
        assert!(LockId(3).is_exclusive());
    }

    #[test]
    fn outcome_exposes_granted_id() {
        assert_eq!(AcquireOutcome::Granted(LockId(4)).lock_id(), Some(LockId(4)));
        assert_eq!(AcquireOutcome::TimedOut.lock_id(), None);
    }
}
