//! An interrupt raised before or after the transfer phase does not cancel a
//! session. Separate binary: the interrupt flag is process-global.

#![cfg(unix)]

use segdl_core::cancel::{self, CancelToken};
use segdl_core::engine::{
    PhaseResult, ProbeResult, TransferEngine, TransferError, TransferOutcome, TransferTarget,
};
use segdl_core::request::TransferRequest;
use segdl_core::session::{Session, SessionOptions, SessionStatus, UrlRequest};
use segdl_core::splitter::RequestBatch;
use tempfile::tempdir;

const LEN: u64 = 4096;

/// Raises the interrupt during the probe, then writes every segment.
struct EarlyInterruptEngine {
    cancelled_during_run: bool,
}

impl TransferEngine for EarlyInterruptEngine {
    fn probe(&mut self, _request: &TransferRequest) -> PhaseResult<ProbeResult> {
        cancel::request_interrupt();
        Ok(ProbeResult {
            filename: "file.bin".into(),
            total_length: LEN,
        })
    }

    fn run(
        &mut self,
        _batch: RequestBatch,
        target: TransferTarget<'_>,
        cancel: &CancelToken,
    ) -> PhaseResult<TransferOutcome> {
        self.cancelled_during_run = cancel.is_cancelled();
        let body = vec![7u8; LEN as usize];
        target
            .output
            .write_at(0, &body)
            .map_err(|e| TransferError::Fatal(e.into()))?;
        target.segments.mark_all_completed();
        Ok(TransferOutcome {
            finished: true,
            file_path: target.output.path().to_path_buf(),
            total_size: LEN,
        })
    }
}

fn run_once(dir: &std::path::Path, name: &str) -> (SessionStatus, bool) {
    let request = UrlRequest {
        dir: dir.to_path_buf(),
        out: Some(name.into()),
        ..UrlRequest::new(vec!["https://mirror.example/file.bin".into()])
    };
    let opts = SessionOptions {
        segment_size: 1024,
        ..SessionOptions::default()
    };
    let mut engine = EarlyInterruptEngine {
        cancelled_during_run: false,
    };
    let result = Session::new(&request, &opts, &mut engine)
        .run(&CancelToken::new())
        .unwrap();
    (result.status, engine.cancelled_during_run)
}

#[test]
fn interrupts_outside_transfer_do_not_cancel() {
    let dir = tempdir().unwrap();

    let (status, cancelled) = run_once(dir.path(), "first.bin");
    assert_eq!(status, SessionStatus::Completed);
    assert!(!cancelled, "probe-time interrupt leaked into the transfer");
    assert!(!cancel::interrupted());

    // Left over from a previous session.
    cancel::request_interrupt();
    let (status, cancelled) = run_once(dir.path(), "second.bin");
    assert_eq!(status, SessionStatus::Completed);
    assert!(!cancelled);
}
