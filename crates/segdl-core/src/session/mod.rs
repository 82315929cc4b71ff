//! Session controller: probe → plan → resume check → transfer → verify → finalize.
//!
//! A session owns one output path for its whole run (guarded by the state
//! lock) and performs exactly one engine run. It never recurses into
//! follow-up work; a completed descriptor file comes back as
//! [`SessionResult::follow_up`] for the caller to schedule.

mod error;
mod finish;
mod phase;
mod prepare;


pub use error::SessionError;
pub use phase::Phase;

use std::path::PathBuf;

use crate::cancel::{CancelToken, SignalScope};
use crate::checksum::{verifier_for, Checksum, ChecksumVerifier, ChunkChecksums};
use crate::config::{Capabilities, SegdlConfig};
use crate::continuation::{next_session, SessionDescriptor};
use crate::engine::{ProbeResult, TransferEngine, TransferOutcome, TransferTarget};
use crate::naming::derive_filename;
use crate::probe::probe;
use crate::request::AuthConfig;
use crate::resume_state::{PersistedTransferState, StateFile, StateLock};
use crate::segmenter::SegmentMap;
use crate::splitter::{split, RequestTemplate};
use finish::Finalize;
use phase::PhaseTracker;
use prepare::{prepare, PrepareInput};

/// Policy knobs of a session, resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Connections per source URL.
    pub split: u32,
    /// Cap on active connections; `<= 0` is unbounded.
    pub max_connections: i32,
    pub segment_size: u64,
    pub check_integrity: bool,
    pub resume: bool,
    pub allow_overwrite: bool,
    pub follow_torrent: bool,
    pub follow_metalink: bool,
    pub capabilities: Capabilities,
    pub referer: Option<String>,
    pub auth: Option<AuthConfig>,
}

impl SessionOptions {
    pub fn from_config(cfg: &SegdlConfig) -> Self {
        Self {
            split: cfg.split.max(1),
            max_connections: cfg.max_connections,
            segment_size: cfg.segment_size.max(1),
            check_integrity: cfg.check_integrity,
            resume: cfg.resume,
            allow_overwrite: cfg.allow_overwrite,
            follow_torrent: cfg.follow_torrent,
            follow_metalink: cfg.follow_metalink,
            capabilities: cfg.capabilities,
            referer: cfg.referer.clone(),
            auth: AuthConfig::from_config(cfg),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SegdlConfig::default())
    }
}

/// One logical file and its mirrors.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRequest {
    pub urls: Vec<String>,
    /// Directory the output is written to.
    pub dir: PathBuf,
    /// Output filename; derived from the probe or the URL when absent.
    pub out: Option<String>,
    pub checksum: Option<Checksum>,
    pub chunk_checksums: Option<ChunkChecksums>,
}

impl UrlRequest {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            dir: PathBuf::from("."),
            out: None,
            checksum: None,
            chunk_checksums: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    /// Interrupted; progress persisted for a later resume.
    Aborted,
    /// Recoverable transfer failure; progress persisted.
    Failed,
    VerificationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFileInfo {
    pub filename: PathBuf,
    pub length: u64,
    pub checksum: Option<Checksum>,
}

#[derive(Debug, Clone)]
pub struct SessionResult {
    pub status: SessionStatus,
    pub output_path: PathBuf,
    pub state_path: PathBuf,
    pub probe: Option<ProbeResult>,
    pub skipped_urls: Vec<String>,
    /// Continued from an existing state file.
    pub resumed: bool,
    pub completed: Option<CompletedFileInfo>,
    pub follow_up: Option<SessionDescriptor>,
    /// A whole-file checksum was given but not checked (digests disabled).
    pub checksum_skipped: bool,
    /// Why a `Failed` / `VerificationFailed` session ended.
    pub error: Option<String>,
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

pub struct Session<'a> {
    request: &'a UrlRequest,
    options: &'a SessionOptions,
    engine: &'a mut dyn TransferEngine,
    verifier: Box<dyn ChecksumVerifier>,
}

impl<'a> Session<'a> {
    pub fn new(
        request: &'a UrlRequest,
        options: &'a SessionOptions,
        engine: &'a mut dyn TransferEngine,
    ) -> Self {
        Self {
            request,
            options,
            engine,
            verifier: verifier_for(&options.capabilities),
        }
    }

    pub fn with_verifier(mut self, verifier: Box<dyn ChecksumVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Runs every phase once. Interrupts (SIGINT/SIGTERM, or `cancel`) are
    /// honoured only while bytes are being transferred.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<SessionResult, SessionError> {
        let mut phase = PhaseTracker::start();
        let result = self.run_phases(&mut phase, cancel);
        match &result {
            Ok(r) if r.is_success() => phase.enter(Phase::Done),
            _ => phase.enter(Phase::Aborted),
        }
        result
    }

    fn run_phases(
        &mut self,
        phase: &mut PhaseTracker,
        cancel: &CancelToken,
    ) -> Result<SessionResult, SessionError> {
        let opts = self.options;
        let urls = &self.request.urls;
        for url in urls {
            tracing::info!("Adding URL: {}", url);
        }

        let probed = probe(&mut *self.engine, urls, opts.referer.clone(), opts.auth.clone());

        phase.enter(Phase::Planning);
        let mut batch = split(
            urls,
            opts.split,
            opts.max_connections,
            &RequestTemplate::get(opts.referer.clone(), opts.auth.clone()),
        );
        let skipped_urls = std::mem::take(&mut batch.skipped);
        let first_url = match batch.active.first() {
            Some(r) => r.url_str().to_string(),
            None => return Err(SessionError::NoUsableSource),
        };
        let filename = self
            .request
            .out
            .clone()
            .or_else(|| probed.as_ref().map(|p| p.filename.clone()))
            .unwrap_or_else(|| derive_filename(&first_url, None));
        let total_length = probed.as_ref().map_or(0, |p| p.total_length);
        let output_path = self.request.dir.join(&filename);
        tracing::info!(
            active = batch.active.len(),
            reserve = batch.reserve.len(),
            total_length,
            "planned {}",
            output_path.display()
        );

        phase.enter(Phase::ResumeCheck);
        let _lock = StateLock::acquire(&output_path)?;
        let state = StateFile::for_output(&output_path);
        let prepared = prepare(&PrepareInput {
            output_path: &output_path,
            filename: &filename,
            probed_length: total_length,
            chunks: self.request.chunk_checksums.as_ref(),
            options: opts,
            verifier: self.verifier.as_ref(),
            state: &state,
        })?;
        let mut segments = prepared.segments;
        let chunks = prepared.chunks;

        phase.enter(Phase::Transferring);
        let outcome = if segments.is_finished() {
            tracing::info!("{} already complete; nothing to transfer", output_path.display());
            Ok(TransferOutcome {
                finished: true,
                file_path: output_path.clone(),
                total_size: segments.total_length(),
            })
        } else {
            let _signals = SignalScope::install();
            let token = cancel.with_signals();
            let mut checkpoint = |map: &SegmentMap| {
                state.save(&PersistedTransferState::capture(&filename, map, chunks.as_ref()))
            };
            self.engine.run(
                batch,
                TransferTarget {
                    output: &prepared.output,
                    segments: &mut segments,
                    checkpoint: &mut checkpoint,
                },
                &token,
            )
        };

        phase.enter(Phase::Verifying);
        let finished = Finalize {
            output: prepared.output,
            segments: &mut segments,
            state: &state,
            filename: &filename,
            chunks: chunks.as_ref(),
            checksum: self.request.checksum.as_ref(),
            verifier: self.verifier.as_ref(),
        }
        .finish(outcome)?;

        phase.enter(Phase::Finalizing);
        let follow_up = finished
            .completed
            .as_ref()
            .and_then(|c| next_session(c, opts));

        Ok(SessionResult {
            status: finished.status,
            state_path: state.path().to_path_buf(),
            output_path,
            probe: probed,
            skipped_urls,
            resumed: prepared.resumed,
            completed: finished.completed,
            follow_up,
            checksum_skipped: finished.checksum_skipped,
            error: finished.error,
        })
    }
}
