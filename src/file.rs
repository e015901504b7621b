//! Mailbox file handle and on-disk identity.
//!
//! Kernel locks attach to an open descriptor and the file it refers to, not
//! to a path. If the mailbox is replaced on disk (rewritten via rename,
//! rotated away), locks taken on the old descriptor are meaningless, so the
//! locking layer tracks the (device, inode) identity cached at open time and
//! reopens before locking whenever it no longer matches the path.

use std::fs::{File, Metadata, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Device/inode pair identifying a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

impl FileIdentity {
    /// Identity of the file described by `metadata`.
    pub fn of(metadata: &Metadata) -> Self {
        Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        }
    }
}

/// Access to the open mailbox descriptor and any cached view of its contents.
///
/// Implemented by the storage layer that owns the file; the locking layer is
/// the only caller allowed to close and reopen the descriptor, and does so
/// exactly when the on-disk file no longer matches the cached identity.
pub trait MailboxFile {
    /// Path of the mailbox on disk.
    fn path(&self) -> &Path;

    /// The open descriptor, if any.
    fn file(&self) -> Option<&File>;

    /// Identity cached when the descriptor was opened.
    fn identity(&self) -> Option<FileIdentity>;

    /// Open the mailbox and cache its identity. No-op when already open.
    fn open(&mut self) -> io::Result<()>;

    /// Close the descriptor and forget the cached identity.
    fn close(&mut self);

    /// Drop any cached mapping or buffered stream of the file contents.
    ///
    /// Called before lock transitions and on full release; holding a stale
    /// mapping across relocking is unsafe.
    fn invalidate_stream(&mut self) {}
}

/// Plain filesystem-backed [`MailboxFile`].
///
/// Opens read-write so exclusive record locks can be taken, falling back to
/// read-only for mailboxes the process may only read.
#[derive(Debug)]
pub struct FsMailboxFile {
    path: PathBuf,
    file: Option<File>,
    identity: Option<FileIdentity>,
    read_only: bool,
}

impl FsMailboxFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            identity: None,
            read_only: false,
        }
    }

    /// Whether the current descriptor was opened read-only.
    pub fn read_only(&self) -> bool {
        self.read_only
    }
}

impl MailboxFile for FsMailboxFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    fn open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let (file, read_only) = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => (file, false),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                (File::open(&self.path)?, true)
            }
            Err(err) => return Err(err),
        };
        self.identity = Some(FileIdentity::of(&file.metadata()?));
        self.read_only = read_only;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
        self.identity = None;
    }
}
