//! ResumeCheck: decide between resuming a recorded transfer and a fresh start.

use std::path::Path;

use super::{SessionError, SessionOptions};
use crate::checksum::{ChecksumVerifier, ChunkChecksums};
use crate::resume_state::{PersistedTransferState, StateFile};
use crate::segmenter::SegmentMap;
use crate::storage::OutputFile;

pub(super) struct Prepared {
    pub output: OutputFile,
    pub segments: SegmentMap,
    pub chunks: Option<ChunkChecksums>,
    pub resumed: bool,
}

pub(super) struct PrepareInput<'a> {
    pub output_path: &'a Path,
    pub filename: &'a str,
    /// 0 when unknown.
    pub probed_length: u64,
    pub chunks: Option<&'a ChunkChecksums>,
    pub options: &'a SessionOptions,
    pub verifier: &'a dyn ChecksumVerifier,
    pub state: &'a StateFile,
}

pub(super) fn prepare(input: &PrepareInput<'_>) -> Result<Prepared, SessionError> {
    if input.options.resume {
        if let Some(saved) = input.state.load().map_err(SessionError::State)? {
            if let Some(prepared) = try_resume(input, saved)? {
                return Ok(prepared);
            }
        }
    }
    fresh_start(input)
}

/// `Ok(None)` when the recorded state cannot be continued and a fresh start
/// should decide instead.
fn try_resume(
    input: &PrepareInput<'_>,
    saved: PersistedTransferState,
) -> Result<Option<Prepared>, SessionError> {
    if saved.total_length == 0 {
        tracing::warn!(
            "{} records a download of unknown length; it cannot be resumed",
            input.state.path().display()
        );
        return Ok(None);
    }
    if input.probed_length > 0 && input.probed_length != saved.total_length {
        return Err(SessionError::SizeMismatch {
            path: input.output_path.to_path_buf(),
            recorded: saved.total_length,
            probed: input.probed_length,
        });
    }
    if !input.output_path.exists() {
        tracing::warn!(
            "{} has no partial file next to it; starting over",
            input.state.path().display()
        );
        return Ok(None);
    }

    let mut segments = saved.to_segment_map().map_err(SessionError::State)?;
    let chunks = input.chunks.cloned().or_else(|| saved.chunk_checksums());
    let output = OutputFile::open_existing(input.output_path).map_err(SessionError::Storage)?;
    let on_disk = output.len().map_err(SessionError::Storage)?;
    if on_disk != saved.total_length {
        output
            .set_len(saved.total_length)
            .map_err(SessionError::Storage)?;
    }

    if input.options.check_integrity {
        if let Some(chunks) = chunks.as_ref() {
            verify_completed(input.output_path, &mut segments, chunks, input.verifier)?;
        }
    }
    tracing::info!(
        "resuming {}: {}/{} segments already complete",
        input.output_path.display(),
        segments.bitmap().completed_count(),
        segments.segment_count()
    );
    Ok(Some(Prepared {
        output,
        segments,
        chunks,
        resumed: true,
    }))
}

fn fresh_start(input: &PrepareInput<'_>) -> Result<Prepared, SessionError> {
    let total = input.probed_length;
    let chunks = input.chunks.cloned();
    let segment_length = chunks
        .as_ref()
        .map(|c| c.chunk_length)
        .filter(|&n| n > 0)
        .unwrap_or(input.options.segment_size);
    let mut segments = if total > 0 {
        SegmentMap::new(total, segment_length)
    } else {
        SegmentMap::unknown_length()
    };

    let existing_len = std::fs::metadata(input.output_path).ok().map(|m| m.len());
    let output = match existing_len {
        Some(len) if input.options.check_integrity && total > 0 && len == total => {
            let output =
                OutputFile::open_existing(input.output_path).map_err(SessionError::Storage)?;
            segments.mark_all_completed();
            if let Some(chunks) = chunks.as_ref() {
                verify_completed(input.output_path, &mut segments, chunks, input.verifier)?;
            }
            tracing::info!(
                "adopting existing {} ({}/{} segments verified)",
                input.output_path.display(),
                segments.bitmap().completed_count(),
                segments.segment_count()
            );
            output
        }
        Some(_) if !input.options.allow_overwrite => {
            return Err(SessionError::DestinationExists(
                input.output_path.to_path_buf(),
            ));
        }
        Some(_) => {
            tracing::warn!("overwriting existing {}", input.output_path.display());
            OutputFile::create(input.output_path, total).map_err(SessionError::Storage)?
        }
        None => OutputFile::create(input.output_path, total).map_err(SessionError::Storage)?,
    };

    // The pair (output, state) is consistent from here on.
    let initial = PersistedTransferState::capture(input.filename, &segments, chunks.as_ref());
    input.state.save(&initial).map_err(SessionError::State)?;
    tracing::debug!(
        total_length = total,
        segments = segments.segment_count(),
        "fresh start for {}",
        input.output_path.display()
    );
    Ok(Prepared {
        output,
        segments,
        chunks,
        resumed: false,
    })
}

/// Re-checks segments marked complete against their chunk digests and
/// unmarks the ones that fail. Returns how many were unmarked. Skipped when
/// segment and chunk geometry differ.
pub(super) fn verify_completed(
    path: &Path,
    segments: &mut SegmentMap,
    chunks: &ChunkChecksums,
    verifier: &dyn ChecksumVerifier,
) -> Result<usize, SessionError> {
    if chunks.chunk_length != segments.segment_length() {
        tracing::warn!(
            chunk_length = chunks.chunk_length,
            segment_length = segments.segment_length(),
            "chunk digests do not line up with segments; skipping chunk verification"
        );
        return Ok(0);
    }
    let flags = verifier
        .verify_chunks(path, chunks.algo, chunks.chunk_length, &chunks.digests)
        .map_err(SessionError::Storage)?;
    let mut unmarked = 0;
    for (index, ok) in flags.into_iter().enumerate() {
        if !ok && segments.is_completed(index) {
            segments.mark_incomplete(index);
            unmarked += 1;
        }
    }
    if unmarked > 0 {
        tracing::warn!(
            "{} chunk(s) of {} failed verification and will be downloaded again",
            unmarked,
            path.display()
        );
    }
    Ok(unmarked)
}
