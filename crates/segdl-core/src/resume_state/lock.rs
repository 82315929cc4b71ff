use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::lock_path;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{} is held by another running session", .0.display())]
    Held(PathBuf),
    #[error("lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path, source: io::Error) -> LockError {
    LockError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Exclusive writer guard for one output path.
///
/// On unix the guard is an advisory `flock` on `<out>.lock`, so a lock file
/// left behind by a killed process does not block the next session. The file
/// is removed on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    // Held open for the lifetime of the guard; closing it releases the lock.
    _file: File,
}

impl StateLock {
    pub fn acquire(output: &Path) -> Result<Self, LockError> {
        let path = lock_path(output);
        let mut file = imp::lock(&path)?;
        // Owner pid, for humans inspecting the file.
        file.set_len(0).map_err(|e| io_error(&path, e))?;
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // Unlink while still locked so a waiter cannot lock a detached inode.
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::{io_error, LockError};
    use std::fs::{self, File};
    use std::io::{self, ErrorKind};
    use std::os::unix::fs::MetadataExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    fn try_flock(file: &File) -> io::Result<bool> {
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK => Ok(false),
            _ => Err(err),
        }
    }

    /// The locked handle still names `path` (the previous owner did not
    /// unlink it between our open and our lock).
    fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
        let held = file.metadata()?;
        match fs::metadata(path) {
            Ok(on_disk) => Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(super) fn lock(path: &Path) -> Result<File, LockError> {
        loop {
            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| io_error(path, e))?;
            if !try_flock(&file).map_err(|e| io_error(path, e))? {
                return Err(LockError::Held(path.to_path_buf()));
            }
            if still_linked(&file, path).map_err(|e| io_error(path, e))? {
                return Ok(file);
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::{io_error, LockError};
    use std::fs::{self, File};
    use std::io::ErrorKind;
    use std::path::Path;

    // No advisory locks: existence of the file is the lock.
    pub(super) fn lock(path: &Path) -> Result<File, LockError> {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(LockError::Held(path.to_path_buf()))
            }
            Err(e) => Err(io_error(path, e)),
        }
    }
}
