//! Segment completion bitmap.

/// One bit per segment (LSB of byte 0 = segment 0). Serialized as lowercase
/// hex in the resume state file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBitmap {
    bytes: Vec<u8>,
    count: usize,
}

impl SegmentBitmap {
    /// All-incomplete bitmap for `count` segments.
    pub fn new(count: usize) -> Self {
        SegmentBitmap {
            bytes: vec![0u8; count.div_ceil(8)],
            count,
        }
    }

    /// Rebuild from stored bytes. Extra bytes and bits past `count` are dropped;
    /// missing bytes read as incomplete.
    pub fn from_bytes(bytes: &[u8], count: usize) -> Self {
        let mut b = Self::new(count);
        let copy = bytes.len().min(b.bytes.len());
        b.bytes[..copy].copy_from_slice(&bytes[..copy]);
        b.clear_padding();
        b
    }

    pub fn from_hex(s: &str, count: usize) -> Result<Self, hex::FromHexError> {
        Ok(Self::from_bytes(&hex::decode(s)?, count))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn set_completed(&mut self, index: usize) {
        if index < self.count {
            self.bytes[index / 8] |= 1 << (index % 8);
        }
    }

    pub fn clear(&mut self, index: usize) {
        if index < self.count {
            self.bytes[index / 8] &= !(1 << (index % 8));
        }
    }

    pub fn set_all(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = 0xFF);
        self.clear_padding();
    }

    pub fn is_completed(&self, index: usize) -> bool {
        index < self.count && self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn completed_count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn all_completed(&self) -> bool {
        self.completed_count() == self.count
    }

    /// True if every bit set here is also set in `other`.
    pub fn is_subset_of(&self, other: &SegmentBitmap) -> bool {
        self.count == other.count
            && self
                .bytes
                .iter()
                .zip(&other.bytes)
                .all(|(a, b)| a & !b == 0)
    }

    fn clear_padding(&mut self) {
        let rem = self.count % 8;
        if rem != 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= (1u8 << rem) - 1;
            }
        }
    }
}
