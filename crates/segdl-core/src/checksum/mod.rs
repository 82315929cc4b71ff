//! Content integrity: whole-file and per-chunk digests.
//!
//! Digests are computed on demand after (or before resuming) a transfer, never
//! inline with the write path.

mod verifier;

pub use verifier::{verifier_for, ChecksumVerifier, DigestVerifier, NoopVerifier};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgo {
    Sha1,
    Sha256,
}

impl DigestAlgo {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgo::Sha1 => "sha1",
            DigestAlgo::Sha256 => "sha256",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgo::Sha1 => 40,
            DigestAlgo::Sha256 => 64,
        }
    }
}

impl fmt::Display for DigestAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChecksumParseError {
    #[error("unknown digest algorithm {0:?} (expected sha1 or sha256)")]
    UnknownAlgo(String),
    #[error("expected ALGO=HEX, got {0:?}")]
    MissingSeparator(String),
    #[error("{algo} digest must be {expected} hex characters")]
    BadDigest { algo: DigestAlgo, expected: usize },
}

impl FromStr for DigestAlgo {
    type Err = ChecksumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(DigestAlgo::Sha1),
            "sha256" => Ok(DigestAlgo::Sha256),
            _ => Err(ChecksumParseError::UnknownAlgo(s.to_string())),
        }
    }
}

/// Expected whole-file digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algo: DigestAlgo,
    /// Lowercase hex.
    pub hex: String,
}

impl Checksum {
    pub fn new(algo: DigestAlgo, hex: &str) -> Result<Self, ChecksumParseError> {
        let hex = hex.trim().to_ascii_lowercase();
        if hex.len() != algo.hex_len() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChecksumParseError::BadDigest {
                algo,
                expected: algo.hex_len(),
            });
        }
        Ok(Self { algo, hex })
    }
}

impl FromStr for Checksum {
    type Err = ChecksumParseError;

    /// Parses `sha256=<hex>` / `sha1=<hex>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algo, hex) = s
            .split_once('=')
            .ok_or_else(|| ChecksumParseError::MissingSeparator(s.to_string()))?;
        Checksum::new(algo.parse()?, hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algo, self.hex)
    }
}

/// Expected per-chunk digests; chunk `i` covers `[i*chunk_length, (i+1)*chunk_length)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChecksums {
    pub algo: DigestAlgo,
    pub chunk_length: u64,
    pub digests: Vec<String>,
}

fn hash_reader<D: Digest, R: Read>(
    reader: &mut R,
    mut limit: Option<u64>,
) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let want = match limit {
            Some(0) => break,
            Some(n) => n.min(BUF_SIZE as u64) as usize,
            None => BUF_SIZE,
        };
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        if let Some(l) = limit.as_mut() {
            *l -= n as u64;
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

fn hash_with<R: Read>(
    algo: DigestAlgo,
    reader: &mut R,
    limit: Option<u64>,
) -> std::io::Result<String> {
    match algo {
        DigestAlgo::Sha1 => hash_reader::<Sha1, _>(reader, limit),
        DigestAlgo::Sha256 => hash_reader::<Sha256, _>(reader, limit),
    }
}

/// Digest of a whole file as lowercase hex. Reads in bounded chunks.
pub fn digest_path(path: &Path, algo: DigestAlgo) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    hash_with(algo, &mut f, None).with_context(|| format!("read {}", path.display()))
}

/// Digests of consecutive `chunk_length` ranges; the last chunk may be short.
/// Stops after `max_chunks` chunks or at end of file.
pub fn digest_chunks(
    path: &Path,
    algo: DigestAlgo,
    chunk_length: u64,
    max_chunks: usize,
) -> Result<Vec<String>> {
    anyhow::ensure!(chunk_length > 0, "chunk length must be positive");
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let file_len = f.metadata()?.len();
    let mut out = Vec::new();
    for i in 0..max_chunks {
        let start = i as u64 * chunk_length;
        if start >= file_len {
            break;
        }
        f.seek(SeekFrom::Start(start))?;
        let digest = hash_with(algo, &mut f, Some(chunk_length))
            .with_context(|| format!("read chunk {} of {}", i, path.display()))?;
        out.push(digest);
    }
    Ok(out)
}
