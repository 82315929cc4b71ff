//! Durable per-output progress record.
//!
//! `<output>.state` holds the segment plan and completion bitmap as pretty
//! JSON; `<output>.lock` marks the single session allowed to write it. Both
//! live beside the output file so a new process can pick the download up.

mod file;
mod lock;


pub use file::StateFile;
pub use lock::{LockError, StateLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::checksum::{ChunkChecksums, DigestAlgo};
use crate::segmenter::SegmentMap;

pub const STATE_VERSION: u32 = 1;

/// On-disk shape of `<output>.state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTransferState {
    pub version: u32,
    pub filename: String,
    /// 0 when the length was never learned.
    pub total_length: u64,
    pub segment_length: u64,
    /// Completion bitmap, lowercase hex.
    pub completed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_algo: Option<DigestAlgo>,
    #[serde(default)]
    pub chunk_length: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk_digests: Vec<String>,
}

impl PersistedTransferState {
    pub fn capture(filename: &str, map: &SegmentMap, chunks: Option<&ChunkChecksums>) -> Self {
        Self {
            version: STATE_VERSION,
            filename: filename.to_string(),
            total_length: map.total_length(),
            segment_length: map.segment_length(),
            completed: map.bitmap().to_hex(),
            digest_algo: chunks.map(|c| c.algo),
            chunk_length: chunks.map(|c| c.chunk_length).unwrap_or(0),
            chunk_digests: chunks.map(|c| c.digests.clone()).unwrap_or_default(),
        }
    }

    /// Rebuilds the segment map recorded in this state.
    pub fn to_segment_map(&self) -> Result<SegmentMap> {
        anyhow::ensure!(self.segment_length > 0, "state has zero segment length");
        let bytes = hex::decode(&self.completed).context("state bitmap is not valid hex")?;
        Ok(SegmentMap::with_bitmap(
            self.total_length,
            self.segment_length,
            &bytes,
        ))
    }

    /// Chunk digests carried by the state, if any.
    pub fn chunk_checksums(&self) -> Option<ChunkChecksums> {
        match self.digest_algo {
            Some(algo) if self.chunk_length > 0 && !self.chunk_digests.is_empty() => {
                Some(ChunkChecksums {
                    algo,
                    chunk_length: self.chunk_length,
                    digests: self.chunk_digests.clone(),
                })
            }
            _ => None,
        }
    }
}

/// `path` with `suffix` appended to its file name (`a/b.iso` → `a/b.iso.state`).
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn state_path(output: &Path) -> PathBuf {
    sibling_path(output, ".state")
}

pub fn lock_path(output: &Path) -> PathBuf {
    sibling_path(output, ".lock")
}
