//! Courtesy-lock marker files (`<mailbox>.lock`).
//!
//! Not enforced by the kernel: every program touching the mailbox must honor
//! the convention. A marker is created by writing its metadata to a unique
//! temporary file next to the mailbox, syncing it, and hard-linking it into
//! place. The link fails cleanly when the marker already exists, including on
//! network filesystems where exclusive-create is historically unreliable.
//!
//! Staleness: a marker whose mailbox has been inactive past a configured
//! threshold *may* be abandoned by a dead process. This module only tracks
//! the inactivity signal; proving the holder dead is done by probing the
//! kernel locks (see the staleness resolver in the `locks` module), because a
//! live holder necessarily holds those too.

mod metadata;

pub use metadata::DotlockMetadata;

use crate::file::FileIdentity;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Path of the marker guarding `target`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// A marker file created and owned by this process.
#[derive(Debug)]
pub struct Dotlock {
    path: PathBuf,
    identity: FileIdentity,
}

impl Dotlock {
    /// Try to create the marker for `target`.
    ///
    /// `Ok(None)` means another process holds it. The marker content is
    /// written to a temp file first so a concurrent reader never observes a
    /// half-written marker.
    pub fn try_create(target: &Path) -> io::Result<Option<Dotlock>> {
        let lock_path = lock_path_for(target);
        let temp_path = temp_path_for(&lock_path);

        let json = DotlockMetadata::new().to_json()?;
        write_and_sync(&temp_path, json.as_bytes())?;

        let linked = fs::hard_link(&temp_path, &lock_path);
        let _ = fs::remove_file(&temp_path);

        match linked {
            Ok(()) => {
                let meta = fs::metadata(&lock_path)?;
                Ok(Some(Dotlock {
                    path: lock_path,
                    identity: FileIdentity::of(&meta),
                }))
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Path of the marker file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove our marker.
    ///
    /// If the marker on disk is no longer the one we created (another process
    /// decided we were dead and overrode it), the replacement belongs to
    /// someone else and is left alone. A marker that is already gone counts
    /// as released.
    pub fn unlock(self) -> io::Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) if FileIdentity::of(&meta) == self.identity => fs::remove_file(&self.path),
            Ok(_) => {
                log::warn!(
                    "dotlock '{}' was overridden by another process; leaving it in place",
                    self.path.display()
                );
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Force-remove a marker that was proven abandoned.
pub fn force_break(lock_path: &Path) -> io::Result<()> {
    match fs::remove_file(lock_path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Tracks whether an existing marker looks abandoned.
///
/// Activity is the newest modification observed on either the mailbox or the
/// marker itself, so a marker replaced by a new holder restarts the clock.
/// When a liveness probe proves the holder alive despite the inactivity,
/// staleness is suppressed for a further threshold period instead of
/// re-probing on every poll.
#[derive(Debug)]
pub struct StaleTracker {
    threshold: Duration,
    suppress_until: Option<Instant>,
}

impl StaleTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            suppress_until: None,
        }
    }

    /// Sample the mailbox and marker; true when the marker is a staleness
    /// candidate.
    pub fn sample(&mut self, target: &Path, lock_path: &Path) -> bool {
        if let Some(until) = self.suppress_until {
            if Instant::now() < until {
                return false;
            }
            self.suppress_until = None;
        }

        let newest = [target, lock_path]
            .into_iter()
            .filter_map(|p| fs::metadata(p).ok())
            .filter_map(|m| m.modified().ok())
            .max();

        match newest {
            None => false,
            Some(changed) => SystemTime::now()
                .duration_since(changed)
                .is_ok_and(|age| age >= self.threshold),
        }
    }

    /// The holder answered a liveness probe: treat the lock as active for
    /// another threshold period.
    pub fn suppress(&mut self) {
        self.suppress_until = Some(Instant::now() + self.threshold);
    }
}

/// Unique temp path next to the marker: `.<name>.<pid>.tmp`.
fn temp_path_for(lock_path: &Path) -> PathBuf {
    let name = lock_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    lock_path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Write content to a file and sync it to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    if let Err(err) = file.write_all(content).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(err);
    }
    Ok(())
}
