//! Upload byte counting shared between the request body and the progress sampler

pub mod progress;

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::io::AsyncReadExt;

pub use progress::{ProgressSampler, ProgressSnapshot};

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes handed to the HTTP body so far
#[derive(Debug)]
pub struct UploadProgress {
    bytes_sent: AtomicU64,
    total: u64,
}

impl UploadProgress {
    pub fn new(total: u64) -> Self {
        Self {
            bytes_sent: AtomicU64::new(0),
            total,
        }
    }

    pub fn add(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Read `file` in chunks, adding every chunk to `progress` as it is read.
///
/// The stream ends after the first read error.
pub fn counting_stream(
    file: tokio::fs::File,
    progress: Arc<UploadProgress>,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    futures::stream::unfold(Some((file, progress)), |state| async move {
        let (mut file, progress) = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                progress.add(n as u64);
                Some((Ok(buf), Some((file, progress))))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}
