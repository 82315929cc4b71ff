//! Metadata probe.
//!
//! HEAD first. Servers that reject HEAD (405, 403, ...) get a GET for
//! `Range: bytes=0-0`, and the size is read from `Content-Range`. The
//! filename comes from `Content-Disposition` or the final (post-redirect) URL.

use anyhow::{Context, Result};
use curl::easy::Easy;
use std::str;

use super::headers::ResponseHeaders;
use super::{configure, CurlOptions};
use crate::engine::ProbeResult;
use crate::naming::derive_filename;
use crate::request::TransferRequest;

struct Probed {
    code: u32,
    headers: ResponseHeaders,
    /// CURLINFO_CONTENT_LENGTH_DOWNLOAD; also covers FTP SIZE.
    reported_length: Option<u64>,
    effective_url: Option<String>,
}

pub(super) fn probe(request: &TransferRequest, opts: &CurlOptions) -> Result<ProbeResult> {
    let head = perform(request, opts, false)
        .with_context(|| format!("HEAD {}", request.url_str()))?;
    let probed = if is_success(request, head.code) {
        head
    } else {
        tracing::debug!(
            code = head.code,
            "HEAD rejected by {}, retrying as ranged GET",
            request.url_str()
        );
        let ranged = perform(request, opts, true)
            .with_context(|| format!("ranged GET {}", request.url_str()))?;
        if !is_success(request, ranged.code) {
            anyhow::bail!("probe {} returned status {}", request.url_str(), ranged.code);
        }
        ranged
    };

    let total_length = if probed.code == 206 {
        probed.headers.range_total
    } else {
        probed.headers.content_length.or(probed.reported_length)
    }
    .unwrap_or(0);
    let url = probed
        .effective_url
        .as_deref()
        .unwrap_or(request.url_str());
    let filename = derive_filename(url, probed.headers.content_disposition.as_deref());
    tracing::debug!(
        filename = %filename,
        total_length,
        "probed {}",
        request.url_str()
    );
    Ok(ProbeResult {
        filename,
        total_length,
    })
}

/// FTP reports 2xx/3xx completion codes; 0 means no protocol status at all.
fn is_success(request: &TransferRequest, code: u32) -> bool {
    if request.url().scheme() == "ftp" {
        return code < 400;
    }
    (200..300).contains(&code)
}

fn perform(request: &TransferRequest, opts: &CurlOptions, ranged: bool) -> Result<Probed> {
    let mut headers = ResponseHeaders::default();
    let mut easy = Easy::new();
    configure(&mut easy, request, opts)?;
    easy.timeout(opts.probe_timeout)?;
    if ranged {
        easy.range("0-0")?;
    } else {
        easy.nobody(true)?;
    }

    let mut body_seen = 0usize;
    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push_line(s);
            }
            true
        })?;
        // A server that ignores the range would stream the whole file; stop
        // after the first buffer.
        transfer.write_function(|data| {
            body_seen += data.len();
            Ok(if body_seen > 1 { 0 } else { data.len() })
        })?;
        transfer.perform()
    };
    match result {
        Ok(()) => {}
        Err(e) if ranged && e.is_write_error() => {}
        Err(e) => return Err(e.into()),
    }

    let code = easy.response_code()?;
    let reported_length = easy
        .content_length_download()
        .ok()
        .filter(|&n| n >= 0.0)
        .map(|n| n as u64);
    let effective_url = easy.effective_url()?.map(str::to_string);
    Ok(Probed {
        code,
        headers,
        reported_length,
        effective_url,
    })
}
