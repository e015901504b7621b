//! Walking the configured method list for one transition.
//!
//! All methods in the active list are applied in configuration order; a
//! method that times out stops the walk with everything before it still
//! applied, and the caller decides whether to roll back. The staleness
//! resolver also lives here because proving a dotlock holder dead means
//! running a nested walk over the methods after the dotlock.

use super::context::LockContext;
use super::methods::apply_method;
use super::types::{Direction, LockMode, LockOutcome, Staleness};
use crate::config::LockConfig;
use crate::dotlock::StaleTracker;
use crate::error::Result;
use crate::method::LockMethod;
use crate::notify::{LockNotice, NotifyDecision};
use std::time::Instant;

/// The method list a walk in `direction` operates on.
///
/// Releases walk the list the lock was acquired with, so an exclusive
/// holder's release covers the write-only methods too.
fn active_list<'c>(
    config: &'c LockConfig,
    direction: Direction,
    current_mode: Option<LockMode>,
) -> &'c [LockMethod] {
    let exclusive = direction == Direction::Exclusive
        || (direction == Direction::Unlock && current_mode == Some(LockMode::Exclusive));
    if exclusive {
        config.exclusive_methods()
    } else {
        config.shared_methods()
    }
}

/// Walk the active list from index `start`, applying each method in
/// `direction`.
///
/// Methods already in the target state are skipped, which makes release
/// walks idempotent and lets downgrade walks touch only the methods that
/// still need converting. The per-method held flag is flipped before the
/// attempt so that a cleanup walk after a mid-method failure covers the
/// method that was being applied.
pub(crate) fn lock_list(
    ctx: &mut LockContext<'_>,
    direction: Direction,
    deadline: Option<Instant>,
    start: usize,
) -> Result<LockOutcome> {
    ctx.direction = direction;
    let config = ctx.config;
    let current_mode = ctx.current_mode;
    let target = direction != Direction::Unlock;

    for &method in active_list(config, direction, current_mode)
        .iter()
        .skip(start)
    {
        if ctx.held.get(method) == target {
            continue;
        }
        ctx.held.set(method, target);
        if apply_method(ctx, method, deadline)? == LockOutcome::TimedOut {
            return Ok(LockOutcome::TimedOut);
        }
    }
    Ok(LockOutcome::Granted)
}

/// Verdict for one poll of a contended dotlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DotlockPoll {
    /// Keep waiting.
    Wait,
    /// The holder is dead; break the marker and retry.
    Override,
    /// The notifier gave up; stop with a timeout.
    Abort,
}

/// Decide what to do about a contended dotlock, probing the holder's
/// liveness when the marker first looks abandoned.
///
/// The marker alone cannot distinguish a dead holder from a long-running
/// one, but a live holder necessarily also holds the kernel locks that
/// follow the dotlock in the list. A successful non-blocking grab of those
/// locks proves the holder dead; a refused grab proves it alive, in which
/// case staleness is suppressed for another threshold period rather than
/// re-probed on every poll. Probe failures are treated as a live holder.
/// A proven-dead verdict holds only across consecutive stale observations:
/// a fresh observation means a new holder may have arrived, so the next
/// staleness transition probes again.
pub(crate) fn resolve_stale_dotlock(
    ctx: &mut LockContext<'_>,
    tracker: &mut StaleTracker,
    secs_left: u64,
    mut stale: bool,
) -> DotlockPoll {
    if stale {
        // Only consecutive stale observations reuse a proven-dead verdict;
        // any fresh observation in between re-arms the probe below.
        if ctx.staleness != Staleness::Stale {
            if probe_holder_dead(ctx) {
                ctx.staleness = Staleness::Stale;
            } else {
                ctx.staleness = Staleness::Fresh;
                tracker.suppress();
                stale = false;
            }
        }
    } else {
        ctx.staleness = Staleness::Fresh;
    }

    let notice = if stale {
        LockNotice::HolderStale
    } else {
        LockNotice::HolderActive
    };
    match ctx.notifier.notify(notice, secs_left) {
        NotifyDecision::Abort => DotlockPoll::Abort,
        NotifyDecision::Continue if stale => DotlockPoll::Override,
        NotifyDecision::Continue => DotlockPoll::Wait,
    }
}

/// Probe whether the dotlock holder is dead by grabbing the methods after
/// the dotlock in the active list, non-blocking, then releasing them.
fn probe_holder_dead(ctx: &mut LockContext<'_>) -> bool {
    let Some(start) = probe_start(ctx) else {
        // Nothing left to probe with; assume the holder is alive.
        return false;
    };

    let direction = ctx.direction;
    let granted = matches!(
        lock_list(ctx, direction, None, start),
        Ok(LockOutcome::Granted)
    );
    // Release the probe locks (and reset the held flags a refused probe may
    // have left set) before the real walk continues.
    if let Err(err) = lock_list(ctx, Direction::Unlock, None, start) {
        log::warn!("failed to release liveness-probe locks: {err}");
    }
    ctx.direction = direction;
    granted
}

/// Index of the first method after the dotlock in the active list, provided
/// at least one of those methods is not already held.
fn probe_start(ctx: &LockContext<'_>) -> Option<usize> {
    let list = active_list(ctx.config, ctx.direction, ctx.current_mode);
    let start = list.iter().position(|&m| m == LockMethod::Dotlock)? + 1;
    list[start..]
        .iter()
        .any(|&m| !ctx.held.get(m))
        .then_some(start)
}
