//! Advisory locking of the region file across processes.
//!
//! `flock` locks belong to the open file description, so every thread of
//! this process shares the same lock. Readers within the process are counted
//! and only the first and last reader touch the file lock, writers must
//! already hold the in-process write lock so no readers can be active.

use std::fs::File;
use std::io;

use parking_lot::Mutex;
use tracing::warn;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum LockMode {
    Shared,
    Exclusive,
    Unlock,
}

pub(crate) struct RegionLock {
    file: File,
    readers: Mutex<usize>,
}

impl RegionLock {
    pub(crate) fn new(file: File) -> Self {
        Self {
            file,
            readers: Mutex::new(0),
        }
    }

    #[inline]
    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Acquires a shared lock on the region, blocking while another
    /// process holds the exclusive lock.
    pub(crate) fn shared(&self) -> io::Result<SharedGuard<'_>> {
        let mut readers = self.readers.lock();
        if *readers == 0 {
            apply(&self.file, LockMode::Shared)?;
        }
        *readers += 1;
        Ok(SharedGuard { lock: self })
    }

    /// Acquires the exclusive lock on the region, blocking while any other
    /// process holds a lock.
    ///
    /// The caller must hold the in-process write lock.
    pub(crate) fn exclusive(&self) -> io::Result<ExclusiveGuard<'_>> {
        debug_assert_eq!(*self.readers.lock(), 0);
        apply(&self.file, LockMode::Exclusive)?;
        Ok(ExclusiveGuard { lock: self })
    }
}

pub(crate) struct SharedGuard<'a> {
    lock: &'a RegionLock,
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        let mut readers = self.lock.readers.lock();
        *readers -= 1;
        if *readers == 0 {
            if let Err(e) = apply(&self.lock.file, LockMode::Unlock) {
                warn!(error = ?e, "Failed to release shared region lock");
            }
        }
    }
}

pub(crate) struct ExclusiveGuard<'a> {
    lock: &'a RegionLock,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = apply(&self.lock.file, LockMode::Unlock) {
            warn!(error = ?e, "Failed to release exclusive region lock");
        }
    }
}

#[cfg(unix)]
fn apply(file: &File, mode: LockMode) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let operation = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
        LockMode::Unlock => libc::LOCK_UN,
    };

    loop {
        let result = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if result == 0 {
            return Ok(());
        }

        let error = io::Error::last_os_error();
        if error.kind() != io::ErrorKind::Interrupted {
            return Err(error);
        }
    }
}

#[cfg(not(unix))]
fn apply(_file: &File, _mode: LockMode) -> io::Result<()> {
    // No advisory locking, only in-process access is synchronised.
    Ok(())
}
