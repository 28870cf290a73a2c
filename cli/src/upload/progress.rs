//! Sampling the upload counter for display

use std::sync::Arc;
use std::time::Instant;

use crate::upload::UploadProgress;

/// Point-in-time view of an upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes_sent: u64,
    pub total: u64,
    pub bytes_per_second: f64,
}

impl ProgressSnapshot {
    /// Whole percent, 0 to 100
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.bytes_sent.min(self.total) as u128 * 100) / self.total as u128) as u8
    }
}

/// Reads the shared counter and derives throughput.
///
/// Sampled byte counts never go backwards, and throughput is only
/// recomputed once bytes have actually moved.
pub struct ProgressSampler {
    progress: Arc<UploadProgress>,
    started: Instant,
    last_bytes: u64,
    bytes_per_second: f64,
}

impl ProgressSampler {
    pub fn new(progress: Arc<UploadProgress>) -> Self {
        Self::started_at(progress, Instant::now())
    }

    pub fn started_at(progress: Arc<UploadProgress>, started: Instant) -> Self {
        Self {
            progress,
            started,
            last_bytes: 0,
            bytes_per_second: 0.0,
        }
    }

    pub fn sample(&mut self) -> ProgressSnapshot {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&mut self, now: Instant) -> ProgressSnapshot {
        let total = self.progress.total();
        let sent = self.progress.bytes_sent().min(total).max(self.last_bytes);
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if sent > 0 && elapsed > 0.0 {
            self.bytes_per_second = sent as f64 / elapsed;
        }
        self.last_bytes = sent;
        self.snapshot()
    }

    /// The upload finished. Completion wins over whatever was last sampled.
    pub fn complete(&mut self) -> ProgressSnapshot {
        self.last_bytes = self.progress.total();
        self.snapshot()
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_sent: self.last_bytes,
            total: self.progress.total(),
            bytes_per_second: self.bytes_per_second,
        }
    }
}
