//! Transfer engine boundary.
//!
//! The session controller talks to the network only through [`TransferEngine`]:
//! one best-effort metadata probe, then one `run` that moves bytes into the
//! output file and marks segments complete. Errors are split into recoverable
//! (the session persists progress and reports failure) and fatal (the session
//! stops without touching the state file).

pub mod curl;
mod progress;

pub use self::curl::{CurlEngine, CurlOptions};
pub use progress::ProgressStats;

use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::request::TransferRequest;
use crate::segmenter::SegmentMap;
use crate::splitter::RequestBatch;
use crate::storage::OutputFile;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Transient or source-side failure; progress so far is worth keeping.
    #[error("{0:#}")]
    Recoverable(anyhow::Error),
    /// Local failure (disk, invariant); the transfer cannot continue.
    #[error("{0:#}")]
    Fatal(anyhow::Error),
}

/// Result type at phase boundaries.
pub type PhaseResult<T> = Result<T, TransferError>;

/// Metadata learned by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub filename: String,
    /// 0 when the source did not report a length.
    pub total_length: u64,
}

/// What the engine reports when `run` returns normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Every byte is on disk. False after cancellation.
    pub finished: bool,
    pub file_path: PathBuf,
    pub total_size: u64,
}

/// Called with the current map every few completed segments so progress
/// survives a crash.
pub type Checkpoint<'a> = dyn FnMut(&SegmentMap) -> anyhow::Result<()> + 'a;

/// Where `run` writes and what it updates.
pub struct TransferTarget<'a> {
    pub output: &'a OutputFile,
    /// Segments already complete are skipped; the engine marks the rest as they land.
    pub segments: &'a mut SegmentMap,
    pub checkpoint: &'a mut Checkpoint<'a>,
}

pub trait TransferEngine {
    /// Metadata-only request (size and filename) against one source.
    fn probe(&mut self, request: &TransferRequest) -> PhaseResult<ProbeResult>;

    /// Transfers every incomplete segment using the active requests, drawing
    /// on `batch.reserve` when an active connection fails for good. Returns
    /// `Ok` with `finished == false` when `cancel` fired.
    fn run(
        &mut self,
        batch: RequestBatch,
        target: TransferTarget<'_>,
        cancel: &CancelToken,
    ) -> PhaseResult<TransferOutcome>;
}
