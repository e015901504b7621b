//! Thin wrappers over the kernel locking syscalls.
//!
//! All `unsafe` in the crate is confined to this module. Each wrapper is a
//! single non-blocking call; the retry/backoff/notification loops live with
//! the primitive implementations.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Take, convert, or release a whole-file POSIX record lock (`F_SETLK`).
///
/// `lock_type` is `F_RDLCK`, `F_WRLCK`, or `F_UNLCK`. Non-blocking: contention
/// surfaces as `EAGAIN`/`EACCES`.
pub(crate) fn fcntl_setlk(file: &File, lock_type: libc::c_short) -> io::Result<()> {
    // SAFETY: an all-zero flock is a valid value; the fields that matter are
    // set explicitly below (whole file from offset 0).
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = lock_type;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = 0;
    fl.l_len = 0;

    // SAFETY: fd is valid for the lifetime of `file`; fl outlives the call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &fl) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// `flock(2)` with the given operation (`LOCK_SH`/`LOCK_EX`/`LOCK_UN`,
/// optionally `| LOCK_NB`).
pub(crate) fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: fd is valid for the lifetime of `file`.
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// `lockf(3)` with the given command (`F_TLOCK`/`F_ULOCK`), covering the
/// whole file from the current offset.
pub(crate) fn lockf(file: &File, command: libc::c_int) -> io::Result<()> {
    // SAFETY: fd is valid for the lifetime of `file`.
    let rc = unsafe { libc::lockf(file.as_raw_fd(), command, 0) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// True when the error means the lock is held by someone else rather than a
/// real failure.
pub(crate) fn is_contention(err: &io::Error) -> bool {
    // EWOULDBLOCK aliases EAGAIN on most platforms, but not all.
    err.raw_os_error().is_some_and(|code| {
        code == libc::EAGAIN || code == libc::EACCES || code == libc::EWOULDBLOCK
    })
}

/// Sleep 100–200ms with jitter so competing waiters do not retry in lockstep.
pub(crate) fn retry_sleep() {
    std::thread::sleep(Duration::from_millis(fastrand::u64(100..=200)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn fcntl_lock_and_unlock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "x").unwrap();
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();

        fcntl_setlk(&file, libc::F_WRLCK as libc::c_short).unwrap();
        fcntl_setlk(&file, libc::F_UNLCK as libc::c_short).unwrap();
    }

    #[test]
    fn flock_conflict_between_descriptors_is_contention() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "x").unwrap();

        let first = fs::File::open(&path).unwrap();
        let second = fs::File::open(&path).unwrap();

        flock(&first, libc::LOCK_EX | libc::LOCK_NB).unwrap();
        let err = flock(&second, libc::LOCK_EX | libc::LOCK_NB).unwrap_err();
        assert!(is_contention(&err));
        flock(&first, libc::LOCK_UN).unwrap();
        flock(&second, libc::LOCK_EX | libc::LOCK_NB).unwrap();
    }
}
