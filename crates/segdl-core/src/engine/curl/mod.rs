//! libcurl-backed [`TransferEngine`].
//!
//! - `head`: metadata probe (HEAD, falling back to a one-byte ranged GET).
//! - `segment`: one HTTP Range GET (or FTP REST) per segment.
//! - `single`: one sequential GET when the length is unknown or the source
//!   ignores ranges.
//! - `pool`: worker threads, one per active request, sharing a segment queue.
//!
//! Everything here blocks; async callers wrap it in `spawn_blocking`.

mod head;
mod headers;
mod pool;
pub mod retry;
mod segment;
mod single;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use curl::easy::Easy;

use super::{
    PhaseResult, ProbeResult, ProgressStats, TransferEngine, TransferError, TransferOutcome,
    TransferTarget,
};
use crate::cancel::CancelToken;
use crate::config::SegdlConfig;
use crate::request::TransferRequest;
use crate::splitter::RequestBatch;
use pool::PoolEnd;
use retry::RetryPolicy;

const USER_AGENT: &str = concat!("segdl/", env!("CARGO_PKG_VERSION"));

/// Per-handle settings shared by probe and transfer.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
    /// Abort a connection slower than this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Total bandwidth cap, shared evenly by the active connections.
    pub max_bytes_per_sec: Option<u64>,
    pub retry: RetryPolicy,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self::from_config(&SegdlConfig::default())
    }
}

impl CurlOptions {
    pub fn from_config(cfg: &SegdlConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs.max(1)),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            max_bytes_per_sec: cfg.max_bytes_per_sec.filter(|&b| b > 0),
            retry: cfg.retry.as_ref().map(RetryPolicy::from).unwrap_or_default(),
        }
    }

    fn per_connection_speed(&self, connections: usize) -> Option<u64> {
        self.max_bytes_per_sec
            .map(|total| (total / connections.max(1) as u64).max(1))
    }
}

/// Stop condition for workers: the caller's token or an internal abort after
/// a fatal error on another connection.
#[derive(Debug, Clone)]
pub(crate) struct Interrupt {
    cancel: CancelToken,
    abort: Arc<AtomicBool>,
}

impl Interrupt {
    pub(crate) fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub(crate) fn requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }
}

/// Options common to every handle: URL, redirects, referer, credentials, timeouts.
fn configure(
    easy: &mut Easy,
    request: &TransferRequest,
    opts: &CurlOptions,
) -> Result<(), curl::Error> {
    easy.url(request.url_str())?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.low_speed_limit(opts.low_speed_limit)?;
    easy.low_speed_time(opts.low_speed_time)?;
    if let Some(referer) = request.referer() {
        easy.referer(referer)?;
    }
    if let Some(auth) = request.effective_auth() {
        if let Some(user) = auth.user.as_deref() {
            easy.username(user)?;
        }
        if let Some(password) = auth.password.as_deref() {
            easy.password(password)?;
        }
    }
    Ok(())
}

pub struct CurlEngine {
    options: CurlOptions,
    progress: Option<tokio::sync::mpsc::Sender<ProgressStats>>,
}

impl CurlEngine {
    pub fn new(options: CurlOptions) -> Self {
        Self {
            options,
            progress: None,
        }
    }

    pub fn from_config(cfg: &SegdlConfig) -> Self {
        Self::new(CurlOptions::from_config(cfg))
    }

    /// Sends a [`ProgressStats`] snapshot after each completed segment (dropped when full).
    pub fn with_progress(mut self, tx: tokio::sync::mpsc::Sender<ProgressStats>) -> Self {
        self.progress = Some(tx);
        self
    }
}

impl TransferEngine for CurlEngine {
    fn probe(&mut self, request: &TransferRequest) -> PhaseResult<ProbeResult> {
        head::probe(request, &self.options).map_err(TransferError::Recoverable)
    }

    fn run(
        &mut self,
        batch: RequestBatch,
        target: TransferTarget<'_>,
        cancel: &CancelToken,
    ) -> PhaseResult<TransferOutcome> {
        let TransferTarget {
            output,
            segments,
            checkpoint,
        } = target;
        let progress = self.progress.as_ref();
        if !segments.is_length_known() {
            return single::run_stream(batch, output, segments, &self.options, cancel, progress);
        }
        let fallback = batch.clone();
        let end = pool::run_segments(
            batch,
            output,
            segments,
            checkpoint,
            &self.options,
            cancel,
            progress,
        )?;
        match end {
            PoolEnd::Transferred(outcome) => Ok(outcome),
            PoolEnd::RangesIgnored => {
                tracing::warn!(
                    "{}: source ignores byte ranges, retrying as a single stream",
                    output.path().display()
                );
                single::run_stream(fallback, output, segments, &self.options, cancel, progress)
            }
        }
    }
}
