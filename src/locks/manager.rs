//! Reference-counted lock manager for one mailbox.

use super::context::LockContext;
use super::orchestrator::lock_list;
use super::types::{AcquireOutcome, Direction, LockId, LockMode, LockOutcome, Staleness};
use crate::config::LockConfig;
use crate::dotlock::Dotlock;
use crate::error::Result;
use crate::file::{FsMailboxFile, MailboxFile};
use crate::method::MethodFlags;
use crate::notify::{LockNotifier, NoopNotifier};
use std::path::Path;
use std::time::{Duration, Instant};

/// Cooperative multi-method lock over one mbox mailbox.
///
/// Acquisitions are reference counted, so nested callers in the same process
/// share the underlying locks: the kernel and dotlock state only changes on
/// the first acquire and the last release. Each successful acquire returns a
/// [`LockId`] that the matching release must present; the ids carry an epoch
/// that advances every time the mailbox goes through a full unlock, so a
/// leaked id from an earlier locking cycle is caught instead of silently
/// unbalancing the counts.
///
/// Exclusive access can be nested under exclusive and shared under exclusive,
/// but upgrading shared to exclusive would deadlock against another process
/// doing the same and is a caller bug.
pub struct MailboxLock {
    config: LockConfig,
    file: Box<dyn MailboxFile>,
    dotlock: Option<Dotlock>,
    mode: Option<LockMode>,
    lock_id: u32,
    shared_refs: u32,
    excl_refs: u32,
}

impl MailboxLock {
    /// Manage locking for the mailbox behind `file`.
    pub fn new(config: LockConfig, file: impl MailboxFile + 'static) -> Self {
        Self {
            config,
            file: Box::new(file),
            dotlock: None,
            mode: None,
            lock_id: 0,
            shared_refs: 0,
            excl_refs: 0,
        }
    }

    /// Manage locking for the mailbox at `path` on the local filesystem.
    pub fn open(config: LockConfig, path: impl AsRef<Path>) -> Self {
        Self::new(config, FsMailboxFile::new(path.as_ref()))
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Mode the mailbox is currently locked in, if any.
    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    pub fn shared_refs(&self) -> u32 {
        self.shared_refs
    }

    pub fn exclusive_refs(&self) -> u32 {
        self.excl_refs
    }

    /// Current epoch value; advances by two on every full unlock.
    pub fn lock_epoch(&self) -> u32 {
        self.lock_id
    }

    /// The managed mailbox file.
    pub fn file(&self) -> &dyn MailboxFile {
        self.file.as_ref()
    }

    /// Acquire the mailbox lock in `mode`.
    ///
    /// When the mailbox is already locked the request is satisfied by
    /// bumping a refcount; otherwise the configured method list is walked,
    /// waiting up to the configured timeout with progress reported through
    /// `notifier`. On `TimedOut` nothing is held and nothing has changed.
    ///
    /// # Panics
    ///
    /// Panics when asked for exclusive access while the mailbox is locked
    /// shared: upgrading deadlocks against another process upgrading at the
    /// same time, so it is rejected as a caller bug.
    pub fn acquire(
        &mut self,
        mode: LockMode,
        notifier: &mut dyn LockNotifier,
    ) -> Result<AcquireOutcome> {
        assert!(
            mode == LockMode::Shared || self.mode != Some(LockMode::Shared),
            "cannot upgrade a shared mailbox lock to exclusive"
        );

        if self.mode.is_none() {
            match self.update_locking(mode, notifier)? {
                LockOutcome::Granted => self.lock_id = self.lock_id.wrapping_add(2),
                LockOutcome::TimedOut => return Ok(AcquireOutcome::TimedOut),
            }
        }

        let id = match mode {
            LockMode::Shared => {
                self.shared_refs += 1;
                LockId(self.lock_id)
            }
            LockMode::Exclusive => {
                self.excl_refs += 1;
                LockId(self.lock_id + 1)
            }
        };
        Ok(AcquireOutcome::Granted(id))
    }

    /// Release one acquisition.
    ///
    /// The underlying locks are only touched when the last reference goes
    /// away; releasing the last exclusive reference while shared references
    /// remain downgrades the held locks in place, without a window where the
    /// mailbox is unlocked.
    ///
    /// # Panics
    ///
    /// Panics when `id` comes from a previous locking cycle or does not
    /// match anything currently held.
    pub fn release(&mut self, id: LockId) -> Result<()> {
        assert_eq!(
            id.0 & !1,
            self.lock_id,
            "lock id {} is from a previous locking cycle",
            id.value()
        );

        if id.is_exclusive() {
            assert!(self.excl_refs > 0, "no exclusive lock is held");
            self.excl_refs -= 1;
            if self.excl_refs > 0 {
                return Ok(());
            }
            if self.shared_refs > 0 {
                match self.update_locking(LockMode::Shared, &mut NoopNotifier)? {
                    LockOutcome::Granted => {}
                    LockOutcome::TimedOut => {
                        // Shared readers remain; stay exclusive until they
                        // drain rather than drop locks they rely on.
                        log::warn!(
                            "downgrading mailbox lock '{}' timed out; keeping it exclusive",
                            self.file.path().display()
                        );
                    }
                }
                return Ok(());
            }
        } else {
            assert!(self.shared_refs > 0, "no shared lock is held");
            self.shared_refs -= 1;
            if self.shared_refs > 0 || self.excl_refs > 0 {
                return Ok(());
            }
        }

        self.unlock_all()
    }

    /// Transition the underlying locks to `target`, walking the configured
    /// method list.
    fn update_locking(
        &mut self,
        target: LockMode,
        notifier: &mut dyn LockNotifier,
    ) -> Result<LockOutcome> {
        notifier.reset();
        let wait = self.config.wait_timeout();
        let deadline = (wait > Duration::ZERO).then(|| Instant::now() + wait);
        let downgrading = self.mode == Some(LockMode::Exclusive);

        let mut held = MethodFlags::default();
        if downgrading {
            // Everything from the exclusive list is held; the shared-list
            // methods are the ones that still need converting in place.
            held.fill(true);
            for &method in self.config.shared_methods() {
                held.set(method, false);
            }
        } else {
            self.file.invalidate_stream();
        }

        let mut ctx = LockContext {
            file: self.file.as_mut(),
            dotlock: &mut self.dotlock,
            config: &self.config,
            notifier,
            held,
            direction: Direction::from(target),
            current_mode: Some(target),
            checked_file: false,
            staleness: Staleness::Unknown,
        };

        match lock_list(&mut ctx, Direction::from(target), deadline, 0) {
            Ok(LockOutcome::Granted) => {
                if downgrading {
                    release_write_only_methods(&mut ctx);
                }
                self.mode = Some(target);
                Ok(LockOutcome::Granted)
            }
            Ok(LockOutcome::TimedOut) => {
                if !downgrading {
                    rollback(&mut ctx);
                }
                Ok(LockOutcome::TimedOut)
            }
            Err(err) => {
                if !downgrading {
                    rollback(&mut ctx);
                }
                Err(err)
            }
        }
    }

    /// Drop every held lock and start a new epoch.
    fn unlock_all(&mut self) -> Result<()> {
        let mut notifier = NoopNotifier;
        let mut held = MethodFlags::default();
        held.fill(true);

        let mut ctx = LockContext {
            file: self.file.as_mut(),
            dotlock: &mut self.dotlock,
            config: &self.config,
            notifier: &mut notifier,
            held,
            direction: Direction::Unlock,
            current_mode: self.mode,
            checked_file: false,
            staleness: Staleness::Unknown,
        };
        let result = lock_list(&mut ctx, Direction::Unlock, None, 0).map(|_| ());

        self.file.invalidate_stream();
        self.mode = None;
        self.shared_refs = 0;
        self.excl_refs = 0;
        self.lock_id = self.lock_id.wrapping_add(2);
        result
    }
}

impl Drop for MailboxLock {
    fn drop(&mut self) {
        if self.mode.is_some() {
            log::warn!(
                "mailbox lock '{}' dropped while held; releasing",
                self.file.path().display()
            );
            if let Err(err) = self.unlock_all() {
                log::warn!("failed to release mailbox lock on drop: {err}");
            }
        }
    }
}

/// Second phase of a downgrade: the shared-list locks were converted in
/// place, so release only the write-only methods.
fn release_write_only_methods(ctx: &mut LockContext<'_>) {
    ctx.held.fill(false);
    for &method in ctx.config.exclusive_methods() {
        ctx.held.set(method, true);
    }
    for &method in ctx.config.shared_methods() {
        ctx.held.set(method, false);
    }
    ctx.current_mode = Some(LockMode::Exclusive);
    if let Err(err) = lock_list(ctx, Direction::Unlock, None, 0) {
        log::warn!("failed to release write-only locks during downgrade: {err}");
    }
    ctx.current_mode = Some(LockMode::Shared);
}

/// Undo a partially applied acquire so a timeout leaves nothing held.
fn rollback(ctx: &mut LockContext<'_>) {
    if let Err(err) = lock_list(ctx, Direction::Unlock, None, 0) {
        log::warn!("failed to roll back a partial lock acquisition: {err}");
    }
    ctx.file.invalidate_stream();
}
