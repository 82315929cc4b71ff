//! Response header lines → the few fields the engine needs.

/// Fields from the final response of a (possibly redirected) request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct ResponseHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    /// Complete length from `Content-Range: bytes a-b/total`.
    pub range_total: Option<u64>,
    pub content_disposition: Option<String>,
}

impl ResponseHeaders {
    /// Feeds one raw header line. A status line starts a new response, so
    /// only the headers after the last redirect survive.
    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.starts_with("HTTP/") {
            *self = ResponseHeaders {
                status: parse_status(line),
                ..Default::default()
            };
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse().ok();
        } else if name.eq_ignore_ascii_case("content-range") {
            self.range_total = parse_range_total(value);
        } else if name.eq_ignore_ascii_case("content-disposition") {
            self.content_disposition = Some(value.to_string());
        }
    }

    /// Total length, preferring `Content-Range` over `Content-Length`.
    pub fn total_length(&self) -> Option<u64> {
        self.range_total.or(self.content_length)
    }
}

fn parse_status(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// `bytes 0-0/12345` → 12345; `bytes 0-0/*` → None.
pub(super) fn parse_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
