//! Segment queue shared by one worker thread per active request.
//!
//! Workers pop segment indices from the queue. A worker whose connection
//! fails for good puts its segment back and continues with the next request
//! from the reserve, or exits when the reserve is empty. The coordinating
//! thread owns the [`SegmentMap`]: it marks completions, checkpoints the
//! state and reports progress.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;

use super::retry::{run_with_retry, SegmentError};
use super::segment::fetch_segment;
use super::{CurlOptions, Interrupt};
use crate::cancel::CancelToken;
use crate::engine::{Checkpoint, PhaseResult, ProgressStats, TransferError, TransferOutcome};
use crate::request::TransferRequest;
use crate::segmenter::{Segment, SegmentMap};
use crate::splitter::RequestBatch;
use crate::storage::OutputFile;

/// Completed segments between two state checkpoints.
const CHECKPOINT_EVERY: usize = 2;
const IDLE_POLL: Duration = Duration::from_millis(50);
const PROGRESS_TICK: Duration = Duration::from_millis(500);

enum Event {
    Done(usize),
    Dropped {
        url: String,
        error: SegmentError,
        replaced: bool,
    },
    Fatal(anyhow::Error),
}

/// How a segmented run ended when no fatal error occurred.
pub(super) enum PoolEnd {
    Transferred(TransferOutcome),
    /// Segments are left and at least one source answered ranged requests
    /// with the whole body; the caller should retry as a single stream.
    RangesIgnored,
}

enum Work {
    Segment(usize, Segment),
    /// Queue empty but another worker may still put a segment back.
    Wait,
    Finished,
}

struct Shared<'a> {
    queue: Mutex<VecDeque<(usize, Segment)>>,
    reserve: Mutex<VecDeque<TransferRequest>>,
    /// Segments taken but not yet completed or put back. Guarded by `queue`.
    in_flight: AtomicUsize,
    active: AtomicUsize,
    received: AtomicU64,
    /// Some source replied 200 to a ranged request.
    ranges_ignored: AtomicBool,
    output: &'a OutputFile,
    opts: &'a CurlOptions,
    max_recv_speed: Option<u64>,
    interrupt: Interrupt,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared<'_> {
    fn take(&self) -> Work {
        let mut queue = lock(&self.queue);
        match queue.pop_front() {
            Some((i, s)) => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                Work::Segment(i, s)
            }
            None if self.in_flight.load(Ordering::SeqCst) > 0 => Work::Wait,
            None => Work::Finished,
        }
    }

    fn put_back(&self, index: usize, segment: Segment) {
        let mut queue = lock(&self.queue);
        queue.push_front((index, segment));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn complete(&self) {
        let _queue = lock(&self.queue);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn next_request(&self) -> Option<TransferRequest> {
        lock(&self.reserve).pop_front()
    }
}

fn worker(shared: &Shared<'_>, mut request: TransferRequest, tx: Sender<Event>) {
    shared.active.fetch_add(1, Ordering::SeqCst);
    loop {
        if shared.interrupt.requested() {
            break;
        }
        let (index, segment) = match shared.take() {
            Work::Segment(i, s) => (i, s),
            Work::Wait => {
                thread::sleep(IDLE_POLL);
                continue;
            }
            Work::Finished => break,
        };
        let result = run_with_retry(&shared.opts.retry, &shared.interrupt, || {
            fetch_segment(
                &request,
                &segment,
                shared.output,
                shared.opts,
                shared.max_recv_speed,
                &shared.interrupt,
                &shared.received,
            )
        });
        match result {
            Ok(()) => {
                shared.complete();
                let _ = tx.send(Event::Done(index));
            }
            Err(SegmentError::Cancelled) => {
                shared.put_back(index, segment);
                break;
            }
            Err(SegmentError::Storage(e)) => {
                shared.put_back(index, segment);
                shared.interrupt.abort();
                let err = anyhow::Error::new(e).context(format!(
                    "write segment {} to {}",
                    index,
                    shared.output.path().display()
                ));
                let _ = tx.send(Event::Fatal(err));
                break;
            }
            Err(error) => {
                shared.put_back(index, segment);
                if matches!(error, SegmentError::RangeIgnored) {
                    shared.ranges_ignored.store(true, Ordering::SeqCst);
                }
                let replacement = shared.next_request();
                let _ = tx.send(Event::Dropped {
                    url: request.url_str().to_string(),
                    error,
                    replaced: replacement.is_some(),
                });
                match replacement {
                    Some(next) => request = next,
                    None => break,
                }
            }
        }
    }
    shared.active.fetch_sub(1, Ordering::SeqCst);
}

fn stats(segments: &SegmentMap, shared: &Shared<'_>, started: Instant) -> ProgressStats {
    ProgressStats {
        bytes_done: segments.completed_bytes(),
        bytes_this_run: shared.received.load(Ordering::Relaxed),
        total_bytes: segments.total_length(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        segments_done: segments.bitmap().completed_count(),
        segment_count: segments.segment_count(),
        active_connections: shared.active.load(Ordering::SeqCst),
    }
}

pub(super) fn run_segments(
    batch: RequestBatch,
    output: &OutputFile,
    segments: &mut SegmentMap,
    checkpoint: &mut Checkpoint<'_>,
    opts: &CurlOptions,
    cancel: &CancelToken,
    progress: Option<&tokio::sync::mpsc::Sender<ProgressStats>>,
) -> PhaseResult<PoolEnd> {
    let outcome = |finished: bool, total_size: u64| {
        PoolEnd::Transferred(TransferOutcome {
            finished,
            file_path: output.path().to_path_buf(),
            total_size,
        })
    };

    let pending = segments.incomplete();
    if pending.is_empty() {
        return Ok(outcome(true, segments.total_length()));
    }
    if batch.active.is_empty() {
        return Err(TransferError::Recoverable(anyhow!("no active connection to transfer with")));
    }

    let RequestBatch {
        mut active,
        mut reserve,
        ..
    } = batch;
    // No more workers than segments; surplus requests become first-choice replacements.
    let workers = active.len().min(pending.len());
    for spare in active.drain(workers..).rev() {
        reserve.push_front(spare);
    }
    tracing::debug!(
        workers,
        reserve = reserve.len(),
        segments = pending.len(),
        "starting segmented transfer"
    );

    let shared = Shared {
        queue: Mutex::new(pending.into_iter().collect()),
        reserve: Mutex::new(reserve),
        in_flight: AtomicUsize::new(0),
        active: AtomicUsize::new(0),
        received: AtomicU64::new(0),
        ranges_ignored: AtomicBool::new(false),
        output,
        opts,
        max_recv_speed: opts.per_connection_speed(workers),
        interrupt: Interrupt::new(cancel.clone()),
    };
    let started = Instant::now();
    let mut fatal: Option<anyhow::Error> = None;

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel::<Event>();
        for request in active {
            let tx = tx.clone();
            let shared = &shared;
            s.spawn(move || worker(shared, request, tx));
        }
        drop(tx);

        let mut since_checkpoint = 0usize;
        let mut last_report = Instant::now();
        loop {
            let event = match rx.recv_timeout(PROGRESS_TICK) {
                Ok(ev) => ev,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(tx) = progress {
                        let _ = tx.try_send(stats(segments, &shared, started));
                    }
                    last_report = Instant::now();
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match event {
                Event::Done(index) => {
                    segments.mark_completed(index);
                    since_checkpoint += 1;
                    if since_checkpoint >= CHECKPOINT_EVERY {
                        since_checkpoint = 0;
                        if let Err(e) = checkpoint(&*segments) {
                            tracing::warn!("failed to checkpoint progress: {:#}", e);
                        }
                    }
                    if let Some(tx) = progress {
                        let all_done = segments.bitmap().all_completed();
                        if last_report.elapsed() >= PROGRESS_TICK || all_done {
                            let _ = tx.try_send(stats(segments, &shared, started));
                            last_report = Instant::now();
                        }
                    }
                }
                Event::Dropped {
                    url,
                    error,
                    replaced,
                } => {
                    tracing::warn!("connection to {} dropped: {}", url, error);
                    if replaced {
                        tracing::info!("continuing with a reserve connection");
                    }
                }
                Event::Fatal(e) => {
                    tracing::error!("aborting transfer: {:#}", e);
                    fatal.get_or_insert(e);
                }
            }
        }
    });

    if let Some(e) = fatal {
        return Err(TransferError::Fatal(e));
    }
    let total = segments.total_length();
    if segments.is_finished() {
        return Ok(outcome(true, total));
    }
    if cancel.is_cancelled() {
        return Ok(outcome(false, total));
    }
    if shared.ranges_ignored.load(Ordering::SeqCst) {
        return Ok(PoolEnd::RangesIgnored);
    }
    let left = segments.segment_count() - segments.bitmap().completed_count();
    Err(TransferError::Recoverable(anyhow!(
        "{} of {} segments incomplete and no usable connection left",
        left,
        segments.segment_count()
    )))
}
