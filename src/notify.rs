//! Progress notification for blocking lock waits.
//!
//! While a lock wait is in progress, the only observable activity is this
//! callback: it carries the seconds remaining before the wait gives up and a
//! classification of the current holder, and its return value is the sole
//! cancellation hook. The notifier is passed capability-style into each
//! acquire call rather than registered globally.

/// Classification reported while waiting on a contended lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockNotice {
    /// The holder appears to be alive; an interactive caller may choose to
    /// abort rather than keep waiting.
    HolderActive,
    /// The holder appears to be dead; its stale dotlock will be cleared.
    HolderStale,
}

/// Returned by a notifier to continue or abort the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    Continue,
    /// Terminate the wait early with a timeout-equivalent result.
    Abort,
}

/// Callback invoked while a lock wait is in progress.
///
/// Invocations arrive at most about once per second of wall-clock time, or on
/// the record lock's five-second cadence.
pub trait LockNotifier {
    /// Called when a new lock transition starts.
    fn reset(&mut self) {}

    /// `secs_left` is the time remaining before the wait times out.
    fn notify(&mut self, notice: LockNotice, secs_left: u64) -> NotifyDecision;
}

/// Notifier that ignores all progress reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl LockNotifier for NoopNotifier {
    fn notify(&mut self, _notice: LockNotice, _secs_left: u64) -> NotifyDecision {
        NotifyDecision::Continue
    }
}

/// Adapter turning a closure into a [`LockNotifier`].
pub struct FnNotifier<F>(pub F);

impl<F> LockNotifier for FnNotifier<F>
where
    F: FnMut(LockNotice, u64) -> NotifyDecision,
{
    fn notify(&mut self, notice: LockNotice, secs_left: u64) -> NotifyDecision {
        (self.0)(notice, secs_left)
    }
}
