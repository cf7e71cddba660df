//! Advisory locking of the index directory.
//!
//! Uses flock() on a lock file next to jobs.index:
//! - Rebuilding: exclusive lock, fails fast if someone else holds it
//! - Building on demand: exclusive lock, waits for a running build
//! - Loading: shared lock, waits for a rebuild to finish so both halves
//!   of the index pair are read from the same save

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Lock file name placed in the index directory
const LOCK_FILE_NAME: &str = "jobs.lock";

#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// A held file lock that releases on drop
pub struct IndexLock {
    #[allow(dead_code)]
    file: File,
}

impl IndexLock {
    /// Take the exclusive (writer) lock without waiting.
    pub fn try_exclusive(index_dir: &Path) -> io::Result<Self> {
        let file = Self::open(index_dir)?;
        Self::try_lock_exclusive(&file)?;
        Ok(IndexLock { file })
    }

    /// Take the exclusive (writer) lock, blocking while anyone else holds it.
    pub fn exclusive(index_dir: &Path) -> io::Result<Self> {
        let file = Self::open(index_dir)?;
        Self::lock(&file, LockMode::Exclusive)?;
        Ok(IndexLock { file })
    }

    /// Take a shared (reader) lock, blocking while a writer holds it.
    pub fn shared(index_dir: &Path) -> io::Result<Self> {
        let file = Self::open(index_dir)?;
        Self::lock(&file, LockMode::Shared)?;
        Ok(IndexLock { file })
    }

    fn open(index_dir: &Path) -> io::Result<File> {
        std::fs::create_dir_all(index_dir)?;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(index_dir.join(LOCK_FILE_NAME))
    }

    #[cfg(unix)]
    fn try_lock_exclusive(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock
                || err.raw_os_error() == Some(libc::EWOULDBLOCK)
                || err.raw_os_error() == Some(libc::EAGAIN)
            {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "Index is locked by another process",
                ));
            }
            return Err(err);
        }
        Ok(())
    }

    #[cfg(unix)]
    fn lock(file: &File, mode: LockMode) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let operation = match mode {
            LockMode::Shared => libc::LOCK_SH,
            LockMode::Exclusive => libc::LOCK_EX,
        };
        let result = unsafe { libc::flock(fd, operation) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock_exclusive(_file: &File) -> io::Result<()> {
        // no locking off unix
        Ok(())
    }

    #[cfg(not(unix))]
    fn lock(_file: &File, _mode: LockMode) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for IndexLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // Release the lock - ignore errors on drop
        unsafe { libc::flock(fd, libc::LOCK_UN) };
    }
}
