//! Segment plan plus completion state for one output file.

use super::{plan_fixed, Segment, SegmentBitmap};

/// Progress snapshot of a transfer. A map with `total_length == 0` describes a
/// download of unknown length: no segments until the length is learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMap {
    total_length: u64,
    segment_length: u64,
    segments: Vec<Segment>,
    bitmap: SegmentBitmap,
}

impl SegmentMap {
    /// All-incomplete map for a file of `total_length` bytes.
    pub fn new(total_length: u64, segment_length: u64) -> Self {
        let segment_length = segment_length.max(1);
        let segments = plan_fixed(total_length, segment_length);
        let bitmap = SegmentBitmap::new(segments.len());
        Self {
            total_length,
            segment_length,
            segments,
            bitmap,
        }
    }

    pub fn unknown_length() -> Self {
        Self::new(0, 1)
    }

    /// Map with previously recorded completion bits.
    pub fn with_bitmap(total_length: u64, segment_length: u64, bitmap_bytes: &[u8]) -> Self {
        let mut map = Self::new(total_length, segment_length);
        map.bitmap = SegmentBitmap::from_bytes(bitmap_bytes, map.segments.len());
        map
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn segment_length(&self) -> u64 {
        self.segment_length
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn bitmap(&self) -> &SegmentBitmap {
        &self.bitmap
    }

    pub fn is_length_known(&self) -> bool {
        self.total_length > 0
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.bitmap.is_completed(index)
    }

    pub fn mark_completed(&mut self, index: usize) {
        self.bitmap.set_completed(index);
    }

    pub fn mark_incomplete(&mut self, index: usize) {
        self.bitmap.clear(index);
    }

    pub fn mark_all_completed(&mut self) {
        self.bitmap.set_all();
    }

    /// Segments still to transfer, in file order.
    pub fn incomplete(&self) -> Vec<(usize, Segment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.bitmap.is_completed(*i))
            .map(|(i, s)| (i, *s))
            .collect()
    }

    pub fn completed_bytes(&self) -> u64 {
        self.segments
            .iter()
            .enumerate()
            .filter(|(i, _)| self.bitmap.is_completed(*i))
            .map(|(_, s)| s.len())
            .sum()
    }

    /// True when the length is known and every segment is on disk.
    pub fn is_finished(&self) -> bool {
        self.is_length_known() && self.bitmap.all_completed()
    }

    /// Records the length discovered by a single-stream transfer and marks it all complete.
    pub fn complete_with_length(&mut self, total_length: u64) {
        *self = Self::new(total_length, self.segment_length.max(total_length));
        self.bitmap.set_all();
    }
}
