//! Sequential GET for sources of unknown length or without range support.
//!
//! The body is written from offset 0. When the length was unknown it is
//! whatever arrives, and the segment map collapses to one completed segment
//! of that length. A failed attempt restarts from zero on the next distinct URL.

use curl::easy::Easy;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::anyhow;

use super::retry::{run_with_retry, SegmentError};
use super::{configure, CurlOptions, Interrupt};
use crate::cancel::CancelToken;
use crate::engine::{PhaseResult, ProgressStats, TransferError, TransferOutcome};
use crate::request::TransferRequest;
use crate::segmenter::SegmentMap;
use crate::splitter::RequestBatch;
use crate::storage::OutputFile;

fn fetch_stream(
    request: &TransferRequest,
    output: &OutputFile,
    opts: &CurlOptions,
    interrupt: &Interrupt,
    received: &AtomicU64,
) -> Result<u64, SegmentError> {
    let mut easy = Easy::new();
    configure(&mut easy, request, opts).map_err(SegmentError::Curl)?;
    if let Some(speed) = opts.per_connection_speed(1) {
        easy.max_recv_speed(speed).map_err(SegmentError::Curl)?;
    }
    easy.progress(true).map_err(SegmentError::Curl)?;

    let written = Cell::new(0u64);
    let interrupted = Cell::new(false);
    let storage_error: Cell<Option<std::io::Error>> = Cell::new(None);
    received.store(0, Ordering::Relaxed);

    let result = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                if interrupt.requested() {
                    interrupted.set(true);
                    return Ok(0);
                }
                let off = written.get();
                if let Err(e) = output.write_at(off, data) {
                    storage_error.set(Some(e));
                    return Ok(0);
                }
                written.set(off + data.len() as u64);
                received.fetch_add(data.len() as u64, Ordering::Relaxed);
                Ok(data.len())
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !interrupt.requested())
            .map_err(SegmentError::Curl)?;
        transfer.perform()
    };

    if let Err(e) = result {
        if let Some(io) = storage_error.take() {
            return Err(SegmentError::Storage(io));
        }
        if interrupted.get() || e.is_aborted_by_callback() {
            return Err(SegmentError::Cancelled);
        }
        return Err(SegmentError::Curl(e));
    }
    let code = easy.response_code().map_err(SegmentError::Curl)?;
    if request.url().scheme() != "ftp" && !(200..300).contains(&code) {
        return Err(SegmentError::Http(code));
    }
    // Trust a length the server did announce.
    if let Ok(announced) = easy.content_length_download() {
        if announced >= 0.0 && announced as u64 != written.get() {
            return Err(SegmentError::PartialTransfer {
                expected: announced as u64,
                received: written.get(),
            });
        }
    }
    Ok(written.get())
}

pub(super) fn run_stream(
    batch: RequestBatch,
    output: &OutputFile,
    segments: &mut SegmentMap,
    opts: &CurlOptions,
    cancel: &CancelToken,
    progress: Option<&tokio::sync::mpsc::Sender<ProgressStats>>,
) -> PhaseResult<TransferOutcome> {
    let interrupt = Interrupt::new(cancel.clone());
    let received = AtomicU64::new(0);
    let started = Instant::now();
    let mut tried: Vec<String> = Vec::new();
    let mut last_error = None;

    for request in batch.active.into_iter().chain(batch.reserve) {
        if interrupt.requested() {
            break;
        }
        if tried.iter().any(|u| u == request.url_str()) {
            continue;
        }
        tried.push(request.url_str().to_string());
        tracing::debug!("single-stream transfer from {}", request.url_str());

        let result = run_with_retry(&opts.retry, &interrupt, || {
            fetch_stream(&request, output, opts, &interrupt, &received)
        });
        match result {
            Ok(length) => {
                output.set_len(length).map_err(TransferError::Fatal)?;
                if segments.is_length_known() && segments.total_length() == length {
                    segments.mark_all_completed();
                } else {
                    segments.complete_with_length(length);
                }
                if let Some(tx) = progress {
                    let _ = tx.try_send(ProgressStats {
                        bytes_done: length,
                        bytes_this_run: length,
                        total_bytes: length,
                        elapsed_secs: started.elapsed().as_secs_f64(),
                        segments_done: segments.segment_count(),
                        segment_count: segments.segment_count(),
                        active_connections: 0,
                    });
                }
                return Ok(TransferOutcome {
                    finished: true,
                    file_path: output.path().to_path_buf(),
                    total_size: length,
                });
            }
            Err(SegmentError::Cancelled) => break,
            Err(SegmentError::Storage(e)) => {
                return Err(TransferError::Fatal(anyhow::Error::new(e).context(format!(
                    "write {}",
                    output.path().display()
                ))));
            }
            Err(e) => {
                tracing::warn!("stream from {} failed: {}", request.url_str(), e);
                last_error = Some(anyhow!("{}: {}", request.url_str(), e));
            }
        }
    }

    if cancel.is_cancelled() {
        return Ok(TransferOutcome {
            finished: false,
            file_path: output.path().to_path_buf(),
            total_size: 0,
        });
    }
    Err(TransferError::Recoverable(
        last_error.unwrap_or_else(|| anyhow!("no usable source for single-stream transfer")),
    ))
}
