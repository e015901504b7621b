//! Mutable state threaded through one lock transition.

use super::types::{Direction, LockMode, Staleness};
use crate::config::LockConfig;
use crate::dotlock::Dotlock;
use crate::error::{LockError, Result};
use crate::file::{FileIdentity, MailboxFile};
use crate::method::MethodFlags;
use crate::notify::LockNotifier;
use std::fs;
use std::io;

/// Working state for one lock transition (acquire, release, or downgrade).
///
/// Borrows the manager's long-lived pieces and carries the per-transition
/// bookkeeping: which methods are currently applied, the direction being
/// walked, and the cached staleness verdict for a contended dotlock.
pub(crate) struct LockContext<'a> {
    pub file: &'a mut dyn MailboxFile,
    pub dotlock: &'a mut Option<Dotlock>,
    pub config: &'a LockConfig,
    pub notifier: &'a mut dyn LockNotifier,

    /// Methods applied so far in this transition (or carried in from the
    /// manager when releasing/downgrading).
    pub held: MethodFlags,

    /// Direction of the current walk. Mutated around liveness probes, which
    /// run their own sub-walks.
    pub direction: Direction,

    /// Mode the mailbox will be in once this transition succeeds.
    pub current_mode: Option<LockMode>,

    /// File identity verified once per transition.
    pub checked_file: bool,

    /// Liveness verdict for the current dotlock holder, if probed.
    pub staleness: Staleness,
}

impl LockContext<'_> {
    /// Make sure the open descriptor refers to the file currently at the
    /// mailbox path, reopening if the file was replaced underneath us.
    ///
    /// Checked at most once per transition; skipped entirely when releasing,
    /// since locks on a replaced file are gone regardless.
    pub fn open_latest(&mut self) -> Result<()> {
        if self.direction == Direction::Unlock {
            return Ok(());
        }
        if !self.checked_file {
            self.checked_file = true;
            if let Some(identity) = self.file.identity() {
                let on_disk = match fs::metadata(self.file.path()) {
                    Ok(meta) => Some(FileIdentity::of(&meta)),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => None,
                    Err(err) => {
                        return Err(LockError::io("stat", self.file.path().to_path_buf(), err));
                    }
                };
                if on_disk != Some(identity) {
                    log::debug!(
                        "mailbox '{}' was replaced on disk; reopening before locking",
                        self.file.path().display()
                    );
                    self.file.invalidate_stream();
                    self.file.close();
                }
            }
        }
        if self.file.file().is_none() {
            let path = self.file.path().to_path_buf();
            self.file
                .open()
                .map_err(|err| LockError::io("open", path, err))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FsMailboxFile;
    use crate::notify::NoopNotifier;
    use std::fs;
    use tempfile::TempDir;

    fn ctx_parts(dir: &TempDir) -> (FsMailboxFile, Option<Dotlock>, LockConfig, NoopNotifier) {
        let path = dir.path().join("mbox");
        fs::write(&path, "From alice\n").unwrap();
        (
            FsMailboxFile::new(path),
            None,
            LockConfig::default(),
            NoopNotifier,
        )
    }

    #[test]
    fn open_latest_opens_the_mailbox() {
        let dir = TempDir::new().unwrap();
        let (mut file, mut dotlock, config, mut notifier) = ctx_parts(&dir);
        let mut ctx = LockContext {
            file: &mut file,
            dotlock: &mut dotlock,
            config: &config,
            notifier: &mut notifier,
            held: MethodFlags::default(),
            direction: Direction::Shared,
            current_mode: Some(LockMode::Shared),
            checked_file: false,
            staleness: Staleness::Unknown,
        };
        ctx.open_latest().unwrap();
        assert!(ctx.file.file().is_some());
        assert!(ctx.checked_file);
    }

    #[test]
    fn open_latest_reopens_replaced_file() {
        let dir = TempDir::new().unwrap();
        let (mut file, mut dotlock, config, mut notifier) = ctx_parts(&dir);
        file.open().unwrap();
        let old = file.identity().unwrap();

        let path = file.path().to_path_buf();
        fs::remove_file(&path).unwrap();
        fs::write(&path, "rewritten").unwrap();

        let mut ctx = LockContext {
            file: &mut file,
            dotlock: &mut dotlock,
            config: &config,
            notifier: &mut notifier,
            held: MethodFlags::default(),
            direction: Direction::Exclusive,
            current_mode: Some(LockMode::Exclusive),
            checked_file: false,
            staleness: Staleness::Unknown,
        };
        ctx.open_latest().unwrap();
        assert_ne!(ctx.file.identity().unwrap().inode, old.inode);
    }

    #[test]
    fn open_latest_skipped_when_unlocking() {
        let dir = TempDir::new().unwrap();
        let (mut file, mut dotlock, config, mut notifier) = ctx_parts(&dir);
        let mut ctx = LockContext {
            file: &mut file,
            dotlock: &mut dotlock,
            config: &config,
            notifier: &mut notifier,
            held: MethodFlags::default(),
            direction: Direction::Unlock,
            current_mode: None,
            checked_file: false,
            staleness: Staleness::Unknown,
        };
        ctx.open_latest().unwrap();
        assert!(ctx.file.file().is_none());
    }
}
