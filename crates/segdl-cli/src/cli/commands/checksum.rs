//! `segdl checksum` – digest of a local file.

use anyhow::Result;
use segdl_core::checksum::{self, DigestAlgo};
use std::path::Path;

/// Prints `<hex>  <path>` like sha256sum.
pub async fn run_checksum(path: &Path, algo: DigestAlgo) -> Result<()> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || checksum::digest_path(&owned, algo)).await??;
    println!("{}  {}", digest, path.display());
    Ok(())
}
