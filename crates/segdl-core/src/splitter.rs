//! Connection splitting: source URLs × fan-out → bounded active list + reserve.
//!
//! Pure request-plan construction; no network I/O happens here.

use std::collections::VecDeque;

use crate::request::{AuthConfig, Method, TransferRequest};

/// Fields shared by every request built from one source set.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub referer: Option<String>,
    pub auth: Option<AuthConfig>,
}

impl RequestTemplate {
    pub fn get(referer: Option<String>, auth: Option<AuthConfig>) -> Self {
        Self {
            method: Method::Get,
            referer,
            auth,
        }
    }

    pub fn head(referer: Option<String>, auth: Option<AuthConfig>) -> Self {
        Self {
            method: Method::Head,
            referer,
            auth,
        }
    }
}

/// Planned connections for one engine run.
#[derive(Debug, Clone, Default)]
pub struct RequestBatch {
    /// Connections opened immediately.
    pub active: Vec<TransferRequest>,
    /// Overflow held back; substituted in when an active connection fails.
    pub reserve: VecDeque<TransferRequest>,
    /// Source URLs that were skipped as unrecognized.
    pub skipped: Vec<String>,
}

impl RequestBatch {
    pub fn total_len(&self) -> usize {
        self.active.len() + self.reserve.len()
    }
}

/// Builds `fanout` requests per source URL, in source order. Unrecognized URLs
/// are reported in the second return value and contribute nothing.
pub fn create_requests(
    sources: &[String],
    fanout: u32,
    template: &RequestTemplate,
) -> (Vec<TransferRequest>, Vec<String>) {
    let mut requests = Vec::with_capacity(sources.len() * fanout as usize);
    let mut skipped = Vec::new();
    for raw in sources {
        let req = match TransferRequest::new(
            raw,
            template.method,
            template.referer.clone(),
            template.auth.clone(),
        ) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Unrecognized URL or unsupported protocol: {} ({})", raw, e);
                skipped.push(raw.clone());
                continue;
            }
        };
        requests.extend(std::iter::repeat(req).take(fanout as usize));
    }
    (requests, skipped)
}

/// Moves requests beyond `max_connections` (stable order) to the back of `reserve`.
/// `max_connections <= 0` leaves every request active.
pub fn adjust_request_size(
    requests: &mut Vec<TransferRequest>,
    reserve: &mut VecDeque<TransferRequest>,
    max_connections: i32,
) {
    if max_connections <= 0 {
        return;
    }
    let cap = max_connections as usize;
    if requests.len() > cap {
        reserve.extend(requests.drain(cap..));
    }
}

/// Full split: construct, then cap.
pub fn split(
    sources: &[String],
    fanout: u32,
    max_connections: i32,
    template: &RequestTemplate,
) -> RequestBatch {
    let (mut active, skipped) = create_requests(sources, fanout, template);
    let mut reserve = VecDeque::new();
    adjust_request_size(&mut active, &mut reserve, max_connections);
    tracing::debug!(
        active = active.len(),
        reserve = reserve.len(),
        skipped = skipped.len(),
        "planned request batch"
    );
    RequestBatch {
        active,
        reserve,
        skipped,
    }
}
