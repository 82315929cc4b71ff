use anyhow::Result;
use std::path::Path;

use super::{digest_chunks, digest_path, DigestAlgo};
use crate::config::Capabilities;

/// Confirms that on-disk content matches expected digests.
pub trait ChecksumVerifier: Send + Sync {
    /// False for stand-ins that pass everything without hashing.
    fn is_active(&self) -> bool {
        true
    }

    /// Whole-file check against lowercase hex `expected`.
    fn verify(&self, path: &Path, algo: DigestAlgo, expected: &str) -> Result<bool>;

    /// Per-chunk check; one flag per entry of `digests`. Chunks past end of file fail.
    fn verify_chunks(
        &self,
        path: &Path,
        algo: DigestAlgo,
        chunk_length: u64,
        digests: &[String],
    ) -> Result<Vec<bool>>;
}

/// Real verifier backed by sha1 / sha2.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestVerifier;

impl ChecksumVerifier for DigestVerifier {
    fn verify(&self, path: &Path, algo: DigestAlgo, expected: &str) -> Result<bool> {
        let actual = digest_path(path, algo)?;
        Ok(actual.eq_ignore_ascii_case(expected.trim()))
    }

    fn verify_chunks(
        &self,
        path: &Path,
        algo: DigestAlgo,
        chunk_length: u64,
        digests: &[String],
    ) -> Result<Vec<bool>> {
        let actual = digest_chunks(path, algo, chunk_length, digests.len())?;
        Ok(digests
            .iter()
            .enumerate()
            .map(|(i, want)| {
                actual
                    .get(i)
                    .is_some_and(|got| got.eq_ignore_ascii_case(want.trim()))
            })
            .collect())
    }
}

/// Stand-in when the message-digest capability is disabled: everything passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVerifier;

impl ChecksumVerifier for NoopVerifier {
    fn is_active(&self) -> bool {
        false
    }

    fn verify(&self, _path: &Path, _algo: DigestAlgo, _expected: &str) -> Result<bool> {
        Ok(true)
    }

    fn verify_chunks(
        &self,
        _path: &Path,
        _algo: DigestAlgo,
        _chunk_length: u64,
        digests: &[String],
    ) -> Result<Vec<bool>> {
        Ok(vec![true; digests.len()])
    }
}

pub fn verifier_for(capabilities: &Capabilities) -> Box<dyn ChecksumVerifier> {
    if capabilities.message_digest {
        Box::new(DigestVerifier)
    } else {
        Box::new(NoopVerifier)
    }
}
