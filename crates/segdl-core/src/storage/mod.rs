//! Output file lifecycle.
//!
//! The partial download lives at its final path, next to its `.state` file.
//! Fresh transfers create and preallocate the file (fallocate on Unix when
//! available, else `set_len`); resumed transfers reopen it without truncation.
//! Writes are positional (pwrite) so connections can share one handle.

mod prealloc;

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Shared handle to the output file. Cloning shares the descriptor; the file
/// closes when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct OutputFile {
    file: Arc<File>,
    path: PathBuf,
}

impl OutputFile {
    /// Creates (truncating) the output file and preallocates `length` bytes when non-zero.
    pub fn create(path: &Path, length: u64) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create download dir: {}", parent.display()))?;
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create output file: {}", path.display()))?;
        if length > 0 {
            prealloc::preallocate(&file, length)
                .with_context(|| format!("preallocate {} bytes for {}", length, path.display()))?;
        }
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing partial (or complete) file for random-access writing.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open existing output file: {}", path.display()))?;
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current on-disk length.
    pub fn len(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes all of `data` at `offset` without moving any shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    /// Non-Unix fallback: seek + write on a cloned handle. Not safe for concurrent use.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Truncates or extends the file to exactly `length` bytes.
    pub fn set_len(&self, length: u64) -> Result<()> {
        self.file
            .set_len(length)
            .with_context(|| format!("resize {} to {} bytes", self.path.display(), length))
    }

    /// Flushes file data and metadata to disk.
    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .with_context(|| format!("sync {}", self.path.display()))
    }

    /// Syncs and releases this handle.
    pub fn close(self) -> Result<()> {
        self.sync()?;
        drop(self.file);
        Ok(())
    }
}
