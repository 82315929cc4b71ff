//! Segment type and fixed-size range planning.

/// A single segment: byte range [start, end) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl Segment {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Range in the `start-end` (inclusive end) form libcurl's `range` option takes.
    pub fn curl_range(&self) -> String {
        format!("{}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Cuts `total_length` into segments of `segment_length` bytes; the last may be shorter.
/// Returns an empty vec if either argument is 0.
pub fn plan_fixed(total_length: u64, segment_length: u64) -> Vec<Segment> {
    if total_length == 0 || segment_length == 0 {
        return Vec::new();
    }
    let count = total_length.div_ceil(segment_length);
    (0..count)
        .map(|i| {
            let start = i * segment_length;
            Segment {
                start,
                end: (start + segment_length).min(total_length),
            }
        })
        .collect()
}
