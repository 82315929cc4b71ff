use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{state_path, PersistedTransferState, STATE_VERSION};

/// Handle to the `.state` file of one output path.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn for_output(output: &Path) -> Self {
        Self {
            path: state_path(output),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when there is no state file.
    pub fn load(&self) -> Result<Option<PersistedTransferState>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };
        let state: PersistedTransferState = serde_json::from_str(&data)
            .with_context(|| format!("parse {}", self.path.display()))?;
        anyhow::ensure!(
            state.version == STATE_VERSION,
            "{}: unsupported state version {}",
            self.path.display(),
            state.version
        );
        Ok(Some(state))
    }

    /// Writes the state atomically: temp file in the same dir, fsync, rename.
    pub fn save(&self, state: &PersistedTransferState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let json = serde_json::to_string_pretty(state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp state file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("persist {}", self.path.display()))?;
        Ok(())
    }

    /// Deletes the state file; a missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", self.path.display())),
        }
    }
}
