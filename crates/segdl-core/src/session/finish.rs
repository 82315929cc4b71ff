//! Verifying / Finalizing: interpret the engine's terminal result.

use super::prepare::verify_completed;
use super::{CompletedFileInfo, SessionError, SessionStatus};
use crate::checksum::{Checksum, ChecksumVerifier, ChunkChecksums};
use crate::engine::{PhaseResult, TransferError, TransferOutcome};
use crate::resume_state::{PersistedTransferState, StateFile};
use crate::segmenter::SegmentMap;
use crate::storage::OutputFile;

pub(super) struct Finalize<'a> {
    pub output: OutputFile,
    pub segments: &'a mut SegmentMap,
    pub state: &'a StateFile,
    pub filename: &'a str,
    pub chunks: Option<&'a ChunkChecksums>,
    pub checksum: Option<&'a Checksum>,
    pub verifier: &'a dyn ChecksumVerifier,
}

pub(super) struct Finished {
    pub status: SessionStatus,
    pub completed: Option<CompletedFileInfo>,
    pub checksum_skipped: bool,
    pub error: Option<String>,
}

impl Finalize<'_> {
    fn save_state(&self) -> anyhow::Result<()> {
        self.state.save(&PersistedTransferState::capture(
            self.filename,
            &*self.segments,
            self.chunks,
        ))
    }

    pub fn finish(self, outcome: PhaseResult<TransferOutcome>) -> Result<Finished, SessionError> {
        match outcome {
            Err(TransferError::Fatal(e)) => {
                // Leave the state file as last checkpointed; only release the handle.
                drop(self.output);
                Err(SessionError::Engine(e))
            }
            Err(TransferError::Recoverable(e)) => {
                tracing::error!("transfer of {} failed: {:#}", self.output.path().display(), e);
                if let Err(save_err) = self.save_state() {
                    tracing::warn!("could not persist progress: {:#}", save_err);
                }
                if let Err(sync_err) = self.output.sync() {
                    tracing::warn!("{:#}", sync_err);
                }
                Ok(Finished {
                    status: SessionStatus::Failed,
                    completed: None,
                    checksum_skipped: false,
                    error: Some(format!("{:#}", e)),
                })
            }
            Ok(outcome) if !outcome.finished => {
                self.save_state().map_err(SessionError::State)?;
                self.output.close().map_err(SessionError::Storage)?;
                tracing::info!(
                    "transfer interrupted: {}/{} segments complete",
                    self.segments.bitmap().completed_count(),
                    self.segments.segment_count()
                );
                Ok(Finished {
                    status: SessionStatus::Aborted,
                    completed: None,
                    checksum_skipped: false,
                    error: None,
                })
            }
            Ok(outcome) => self.verify_and_complete(outcome),
        }
    }

    fn verify_and_complete(mut self, outcome: TransferOutcome) -> Result<Finished, SessionError> {
        self.output.sync().map_err(SessionError::Storage)?;
        let mut checksum_skipped = false;
        let verified = match self.checksum {
            Some(expected) if !self.verifier.is_active() => {
                tracing::warn!(
                    "{} checksum for {} not checked: message digests are disabled",
                    expected.algo,
                    self.output.path().display()
                );
                checksum_skipped = true;
                None
            }
            Some(expected) => {
                if let Some(failed) = self.check_whole_file(expected)? {
                    return Ok(failed);
                }
                Some(expected.clone())
            }
            None => None,
        };

        let filename = self.output.path().to_path_buf();
        self.output.close().map_err(SessionError::Storage)?;
        self.state.remove().map_err(SessionError::State)?;
        Ok(Finished {
            status: SessionStatus::Completed,
            completed: Some(CompletedFileInfo {
                filename,
                length: outcome.total_size,
                checksum: verified,
            }),
            checksum_skipped,
            error: None,
        })
    }

    /// `Some` with the `VerificationFailed` result on mismatch.
    fn check_whole_file(&mut self, expected: &Checksum) -> Result<Option<Finished>, SessionError> {
        let path = self.output.path().to_path_buf();
        let ok = self
            .verifier
            .verify(&path, expected.algo, &expected.hex)
            .map_err(SessionError::Storage)?;
        if ok {
            tracing::info!("{} verified ({})", path.display(), expected.algo);
            return Ok(None);
        }
        tracing::error!("{} checksum mismatch for {}", expected.algo, path.display());
        match self.chunks {
            Some(chunks) => {
                verify_completed(&path, &mut *self.segments, chunks, self.verifier)?;
                self.save_state().map_err(SessionError::State)?;
            }
            None => self.state.remove().map_err(SessionError::State)?,
        }
        Ok(Some(Finished {
            status: SessionStatus::VerificationFailed,
            completed: None,
            checksum_skipped: false,
            error: Some(format!("{} checksum mismatch", expected.algo)),
        }))
    }
}
