//! Per-method lock application.
//!
//! Each primitive takes, converts, or releases its lock according to the
//! transition's direction, waiting cooperatively when the lock is contended:
//! non-blocking attempts with jittered sleeps, a deadline, and periodic
//! progress notifications. A `None` deadline means a single attempt.

use super::context::LockContext;
use super::orchestrator::{DotlockPoll, resolve_stale_dotlock};
use super::types::{Direction, LockOutcome, Staleness};
use crate::dotlock::{Dotlock, DotlockMetadata, StaleTracker, force_break, lock_path_for};
use crate::error::{LockError, Result};
use crate::method::LockMethod;
use crate::notify::{LockNotice, NotifyDecision};
use crate::sys;
use std::fs::File;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// Apply one method in the context's current direction.
pub(crate) fn apply_method(
    ctx: &mut LockContext<'_>,
    method: LockMethod,
    deadline: Option<Instant>,
) -> Result<LockOutcome> {
    match method {
        LockMethod::Dotlock => dotlock_apply(ctx, deadline),
        LockMethod::Fcntl => fcntl_apply(ctx, deadline),
        LockMethod::Flock => flock_apply(ctx, deadline),
        LockMethod::Lockf => lockf_apply(ctx, deadline),
    }
}

/// Seconds remaining before `deadline`, rounded up.
fn secs_left(deadline: Instant) -> u64 {
    deadline
        .saturating_duration_since(Instant::now())
        .as_secs_f64()
        .ceil() as u64
}

fn descriptor<'f>(ctx: &'f LockContext<'_>, op: &'static str) -> Result<&'f File> {
    ctx.file.file().ok_or_else(|| {
        LockError::io(
            op,
            ctx.file.path().to_path_buf(),
            io::Error::other("mailbox descriptor is not open"),
        )
    })
}

/// The courtesy marker file. The only method with a staleness story: an
/// existing marker whose mailbox has gone quiet may belong to a dead process,
/// and the resolver decides whether to override it.
fn dotlock_apply(ctx: &mut LockContext<'_>, deadline: Option<Instant>) -> Result<LockOutcome> {
    if ctx.direction == Direction::Unlock {
        if let Some(dotlock) = ctx.dotlock.take()
            && let Err(err) = dotlock.unlock()
        {
            log::warn!("failed to remove dotlock: {err}");
        }
        return Ok(LockOutcome::Granted);
    }

    // The marker has no shared/exclusive distinction: if it is already ours
    // (a downgrade with the dotlock in both lists), there is nothing to do.
    if ctx.dotlock.is_some() {
        return Ok(LockOutcome::Granted);
    }

    let target = ctx.file.path().to_path_buf();
    let lock_path = lock_path_for(&target);
    let mut tracker = StaleTracker::new(ctx.config.stale_threshold());
    ctx.staleness = Staleness::Unknown;

    loop {
        if let Some(dotlock) =
            Dotlock::try_create(&target).map_err(|err| LockError::io("dotlock", &lock_path, err))?
        {
            *ctx.dotlock = Some(dotlock);
            // The mailbox may have been replaced while we waited for the
            // previous holder.
            ctx.checked_file = false;
            ctx.open_latest()?;
            return Ok(LockOutcome::Granted);
        }

        let Some(deadline) = deadline else {
            return Ok(LockOutcome::TimedOut);
        };

        let stale = tracker.sample(&target, &lock_path);
        match resolve_stale_dotlock(ctx, &mut tracker, secs_left(deadline), stale) {
            DotlockPoll::Override => {
                let holder = DotlockMetadata::from_file(&lock_path)
                    .map(|meta| meta.owner)
                    .unwrap_or_else(|_| "unknown".to_string());
                log::warn!(
                    "overriding stale dotlock '{}' held by {}",
                    lock_path.display(),
                    holder
                );
                force_break(&lock_path).map_err(|err| LockError::io("dotlock", &lock_path, err))?;
                continue;
            }
            DotlockPoll::Abort => return Ok(LockOutcome::TimedOut),
            DotlockPoll::Wait => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(LockOutcome::TimedOut);
        }
        thread::sleep((deadline - now).min(Duration::from_secs(1)));
    }
}

/// POSIX record lock over the whole file. Progress is reported on a
/// five-second cadence, matching the traditional alarm-driven wait.
fn fcntl_apply(ctx: &mut LockContext<'_>, deadline: Option<Instant>) -> Result<LockOutcome> {
    let lock_type = match ctx.direction {
        Direction::Shared => libc::F_RDLCK,
        Direction::Exclusive => libc::F_WRLCK,
        Direction::Unlock => libc::F_UNLCK,
    } as libc::c_short;

    if ctx.direction == Direction::Unlock && ctx.file.file().is_none() {
        return Ok(LockOutcome::Granted);
    }
    ctx.open_latest()?;

    let mut last_bucket = None;
    loop {
        let attempt = sys::fcntl_setlk(descriptor(ctx, "fcntl")?, lock_type);
        match attempt {
            Ok(()) => return Ok(LockOutcome::Granted),
            Err(err) if sys::is_contention(&err) => {
                let Some(deadline) = deadline else {
                    return Ok(LockOutcome::TimedOut);
                };
                if Instant::now() >= deadline {
                    return Ok(LockOutcome::TimedOut);
                }
                let secs = secs_left(deadline);
                let bucket = secs.div_ceil(5);
                if last_bucket != Some(bucket) {
                    last_bucket = Some(bucket);
                    if ctx.notifier.notify(LockNotice::HolderActive, secs) == NotifyDecision::Abort
                    {
                        return Ok(LockOutcome::TimedOut);
                    }
                }
                sys::retry_sleep();
            }
            Err(err) => {
                return Err(LockError::io("fcntl", ctx.file.path().to_path_buf(), err));
            }
        }
    }
}

/// BSD whole-descriptor lock.
fn flock_apply(ctx: &mut LockContext<'_>, deadline: Option<Instant>) -> Result<LockOutcome> {
    let operation = match ctx.direction {
        Direction::Shared => libc::LOCK_SH | libc::LOCK_NB,
        Direction::Exclusive => libc::LOCK_EX | libc::LOCK_NB,
        Direction::Unlock => libc::LOCK_UN,
    };
    kernel_wait_loop(ctx, "flock", deadline, |file| sys::flock(file, operation))
}

/// `lockf` section lock. Has no shared mode, so shared transitions still take
/// the exclusive lock.
fn lockf_apply(ctx: &mut LockContext<'_>, deadline: Option<Instant>) -> Result<LockOutcome> {
    let command = match ctx.direction {
        Direction::Shared | Direction::Exclusive => libc::F_TLOCK,
        Direction::Unlock => libc::F_ULOCK,
    };
    kernel_wait_loop(ctx, "lockf", deadline, |file| sys::lockf(file, command))
}

/// Shared attempt/wait loop for the kernel methods without their own cadence:
/// non-blocking attempts, jittered retry sleeps, and at most one progress
/// notification per second.
fn kernel_wait_loop(
    ctx: &mut LockContext<'_>,
    op: &'static str,
    deadline: Option<Instant>,
    mut attempt: impl FnMut(&File) -> io::Result<()>,
) -> Result<LockOutcome> {
    if ctx.direction == Direction::Unlock && ctx.file.file().is_none() {
        return Ok(LockOutcome::Granted);
    }
    ctx.open_latest()?;

    let mut last_notify: Option<Instant> = None;
    loop {
        let result = attempt(descriptor(ctx, op)?);
        match result {
            Ok(()) => return Ok(LockOutcome::Granted),
            Err(err) if sys::is_contention(&err) => {
                let Some(deadline) = deadline else {
                    return Ok(LockOutcome::TimedOut);
                };
                if Instant::now() >= deadline {
                    return Ok(LockOutcome::TimedOut);
                }
                if last_notify.is_none_or(|at| at.elapsed() >= Duration::from_secs(1)) {
                    last_notify = Some(Instant::now());
                    let decision = ctx
                        .notifier
                        .notify(LockNotice::HolderActive, secs_left(deadline));
                    if decision == NotifyDecision::Abort {
                        return Ok(LockOutcome::TimedOut);
                    }
                }
                sys::retry_sleep();
            }
            Err(err) => return Err(LockError::io(op, ctx.file.path().to_path_buf(), err)),
        }
    }
}
