//! PNG Compression
//!
//! Re-encodes generated PNGs at maximum compression before they are cached.
//! Re-encoding is CPU-bound, so concurrent encodes are bounded by a shared
//! semaphore to keep a burst of cache misses from starving the renderer.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use thiserror::Error;
use tokio::sync::Semaphore;

// == Compress Error ==
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("compression task failed: {0}")]
    Task(String),
}

// == Compression Throttle ==
/// Counting semaphore in front of blocking re-encode work.
#[derive(Debug, Clone)]
pub struct CompressionThrottle {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl CompressionThrottle {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Four slots per logical CPU.
    pub fn for_available_parallelism() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cpus * 4)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a slot, then runs `work` on the blocking pool. The slot is
    /// released when `work` finishes, whether it succeeded or not.
    pub async fn run<F, T>(&self, work: F) -> Result<T, CompressError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CompressError::Task(e.to_string()))?;

        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| CompressError::Task(e.to_string()))
    }

    /// Re-encodes `png` under the throttle.
    pub async fn compress(&self, png: Vec<u8>) -> Result<Vec<u8>, CompressError> {
        self.run(move || compress_png(&png)).await?
    }
}

// == Compress PNG ==
/// Decodes `input` and re-encodes it as PNG with the best compression level.
pub fn compress_png(input: &[u8]) -> Result<Vec<u8>, CompressError> {
    let img = image::load_from_memory(input).map_err(|e| CompressError::Decode(e.to_string()))?;

    let mut buf = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| CompressError::Encode(e.to_string()))?;

    Ok(buf.into_inner())
}
