//! Disk space reservation for fresh downloads.

use std::fs::File;
use std::io;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Reserves `size` bytes. On Unix tries `posix_fallocate` for real block
/// allocation; falls back to `set_len` on failure or elsewhere.
pub(super) fn preallocate(file: &File, size: u64) -> io::Result<()> {
    #[cfg(unix)]
    {
        let fd = file.as_raw_fd();
        let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
        if r == 0 {
            return Ok(());
        }
        tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
    }
    file.set_len(size)
}
