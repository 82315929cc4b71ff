//! Best-effort metadata probe before planning the transfer.
//!
//! Builds HEAD requests (fan-out 1, uncapped) for the sources and asks the
//! engine about the first one only. Every failure degrades to `None`; the
//! session then proceeds with an unknown size.

use crate::engine::{ProbeResult, TransferEngine, TransferError};
use crate::request::AuthConfig;
use crate::splitter::{split, RequestTemplate};

pub fn probe(
    engine: &mut dyn TransferEngine,
    sources: &[String],
    referer: Option<String>,
    auth: Option<AuthConfig>,
) -> Option<ProbeResult> {
    let batch = split(sources, 1, 0, &RequestTemplate::head(referer, auth));
    let request = batch.active.first()?;
    match engine.probe(request) {
        Ok(result) => {
            tracing::info!(
                filename = %result.filename,
                total_length = result.total_length,
                "probe of {} succeeded",
                request.url_str()
            );
            Some(result)
        }
        Err(TransferError::Recoverable(e)) => {
            tracing::error!("probe of {} failed: {:#}", request.url_str(), e);
            None
        }
        Err(TransferError::Fatal(e)) => {
            tracing::error!(
                "probe of {} failed fatally, continuing without metadata: {:#}",
                request.url_str(),
                e
            );
            None
        }
    }
}
