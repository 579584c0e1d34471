//! Progress-callback trait for narration events.
//!
//! Inject an [`Arc<dyn NarrationProgressCallback>`] via
//! [`crate::config::NarrationConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through blocks and segments.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2audio::{NarrationProgressCallback, NarrationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     spoken: Arc<AtomicUsize>,
//! }
//!
//! impl NarrationProgressCallback for CountingCallback {
//!     fn on_segment_complete(&self, index: usize, total: usize, audio_bytes: usize) {
//!         self.spoken.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("segment {}/{} → {} bytes", index + 1, total, audio_bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     spoken: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = NarrationConfig::builder()
//!     .progress_callback(counter as Arc<dyn NarrationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes blocks and segments.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive strictly in order; the pipeline never
/// issues two collaborator calls at once.
pub trait NarrationProgressCallback: Send + Sync {
    /// Called once extraction has produced all blocks.
    fn on_extraction_complete(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called after each block has been enriched.
    ///
    /// * `index`: 0-based block index
    /// * `described_image`: whether an image description was attached
    fn on_block_enriched(&self, index: usize, total_blocks: usize, described_image: bool) {
        let _ = (index, total_blocks, described_image);
    }

    /// Called once the chunker has produced the segment list.
    fn on_narration_start(&self, total_segments: usize) {
        let _ = total_segments;
    }

    /// Called just before the synthesis request for a segment.
    fn on_segment_start(&self, index: usize, total_segments: usize) {
        let _ = (index, total_segments);
    }

    /// Called when a segment has been synthesised.
    fn on_segment_complete(&self, index: usize, total_segments: usize, audio_bytes: usize) {
        let _ = (index, total_segments, audio_bytes);
    }

    /// Called when synthesis fails; the assembly stops after this event.
    fn on_segment_error(&self, index: usize, total_segments: usize, error: &str) {
        let _ = (index, total_segments, error);
    }

    /// Called once the merged audio is ready.
    fn on_narration_complete(&self, total_segments: usize, duration_ms: u64) {
        let _ = (total_segments, duration_ms);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl NarrationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NarrationConfig`].
pub type ProgressCallback = Arc<dyn NarrationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        enriched: AtomicUsize,
        described: AtomicUsize,
        segments_done: AtomicUsize,
        errors: AtomicUsize,
    }

    impl NarrationProgressCallback for TrackingCallback {
        fn on_block_enriched(&self, _index: usize, _total: usize, described_image: bool) {
            self.enriched.fetch_add(1, Ordering::SeqCst);
            if described_image {
                self.described.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_segment_complete(&self, _index: usize, _total: usize, _bytes: usize) {
            self.segments_done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_segment_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_complete(4);
        cb.on_block_enriched(0, 4, true);
        cb.on_narration_start(2);
        cb.on_segment_start(0, 2);
        cb.on_segment_complete(0, 2, 1024);
        cb.on_segment_error(1, 2, "boom");
        cb.on_narration_complete(2, 4300);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_block_enriched(0, 3, false);
        tracker.on_block_enriched(1, 3, true);
        tracker.on_block_enriched(2, 3, false);
        tracker.on_segment_complete(0, 2, 10);
        tracker.on_segment_error(1, 2, "HTTP 500");

        assert_eq!(tracker.enriched.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.described.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.segments_done.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn NarrationProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_narration_start(10);
        cb.on_segment_start(0, 10);
    }
}
