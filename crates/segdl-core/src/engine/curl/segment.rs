//! One segment over one connection: ranged GET written at the segment offset.

use curl::easy::Easy;
use std::cell::{Cell, RefCell};
use std::str;
use std::sync::atomic::{AtomicU64, Ordering};

use super::headers::ResponseHeaders;
use super::retry::SegmentError;
use super::{configure, CurlOptions, Interrupt};
use crate::request::TransferRequest;
use crate::segmenter::Segment;
use crate::storage::OutputFile;

/// Why the write callback refused a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    Interrupted,
    RangeIgnored,
    Overflow,
}

/// Downloads `segment` from `request` into `output`. `received` is bumped by
/// every byte written (shared progress counter; not rolled back on failure).
pub(super) fn fetch_segment(
    request: &TransferRequest,
    segment: &Segment,
    output: &OutputFile,
    opts: &CurlOptions,
    max_recv_speed: Option<u64>,
    interrupt: &Interrupt,
    received: &AtomicU64,
) -> Result<(), SegmentError> {
    let mut easy = Easy::new();
    configure(&mut easy, request, opts).map_err(SegmentError::Curl)?;
    easy.range(&segment.curl_range()).map_err(SegmentError::Curl)?;
    if let Some(speed) = max_recv_speed {
        easy.max_recv_speed(speed).map_err(SegmentError::Curl)?;
    }
    easy.progress(true).map_err(SegmentError::Curl)?;

    let headers = RefCell::new(ResponseHeaders::default());
    let written = Cell::new(0u64);
    let refusal: Cell<Option<Refusal>> = Cell::new(None);
    let storage_error: Cell<Option<std::io::Error>> = Cell::new(None);
    let expected = segment.len();

    let result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.borrow_mut().push_line(s);
                }
                true
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .write_function(|data| {
                if interrupt.requested() {
                    refusal.set(Some(Refusal::Interrupted));
                    return Ok(0);
                }
                // 200 to a ranged request means the whole body, from byte 0.
                let full_body = headers.borrow().status == Some(200);
                if full_body && segment.start != 0 {
                    refusal.set(Some(Refusal::RangeIgnored));
                    return Ok(0);
                }
                let off = written.get();
                let len = data.len() as u64;
                if off + len > expected {
                    refusal.set(Some(if full_body {
                        Refusal::RangeIgnored
                    } else {
                        Refusal::Overflow
                    }));
                    return Ok(0);
                }
                if let Err(e) = output.write_at(segment.start + off, data) {
                    storage_error.set(Some(e));
                    return Ok(0);
                }
                written.set(off + len);
                received.fetch_add(len, Ordering::Relaxed);
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
        return Err(match refusal.get() {
            Some(Refusal::Interrupted) => SegmentError::Cancelled,
            Some(Refusal::RangeIgnored) => SegmentError::RangeIgnored,
            Some(Refusal::Overflow) => SegmentError::PartialTransfer {
                expected,
                received: expected + 1,
            },
            None if e.is_aborted_by_callback() => SegmentError::Cancelled,
            None => SegmentError::Curl(e),
        });
    }

    let code = easy.response_code().map_err(SegmentError::Curl)?;
    let is_ftp = request.url().scheme() == "ftp";
    if !is_ftp && !(200..300).contains(&code) {
        return Err(SegmentError::Http(code));
    }
    let got = written.get();
    if got != expected {
        return Err(SegmentError::PartialTransfer {
            expected,
            received: got,
        });
    }
    Ok(())
}
