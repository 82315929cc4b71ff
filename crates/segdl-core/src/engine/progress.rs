//! Progress snapshots sent to the CLI while a transfer runs.

#[derive(Debug, Clone, Default)]
pub struct ProgressStats {
    /// Bytes on disk, including segments completed by earlier sessions.
    pub bytes_done: u64,
    /// Bytes received during this run only (basis for the rate).
    pub bytes_this_run: u64,
    /// 0 when unknown.
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub segments_done: usize,
    pub segment_count: usize,
    pub active_connections: usize,
}

impl ProgressStats {
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_this_run as f64 / self.elapsed_secs
    }

    /// Seconds remaining; `None` when the rate or the total is unknown.
    pub fn eta_secs(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0]; 0 while the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }
}
