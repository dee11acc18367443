//! Progress-callback trait for per-file and per-deck conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline renders each HTML file and writes each deck.
//!
//! The trait is `Send + Sync` because rendering runs on Tokio's blocking pool;
//! callbacks are still invoked strictly one file at a time.
//!
//! # Example
//!
//! ```rust
//! use html2deck::{ConversionProgressCallback, ConversionConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ImageCounter {
//!     images: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for ImageCounter {
//!     fn on_file_complete(&self, index: usize, total: usize, _source: &Path, images: usize) {
//!         self.images.fetch_add(images, Ordering::SeqCst);
//!         eprintln!("File {}/{} done ({} pages)", index, total, images);
//!     }
//! }
//!
//! let counter = Arc::new(ImageCounter {
//!     images: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it processes each file and deck.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` arguments are 1-based.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first HTML file is rendered.
    fn on_render_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a browser session is launched for a file.
    fn on_file_start(&self, index: usize, total_files: usize, source: &Path) {
        let _ = (index, total_files, source);
    }

    /// Called when every page-marker element of a file has been captured.
    ///
    /// `images` may be zero when the document has no page markers.
    fn on_file_complete(&self, index: usize, total_files: usize, source: &Path, images: usize) {
        let _ = (index, total_files, source, images);
    }

    /// Called when a file fails; the run continues with the next file.
    fn on_file_error(&self, index: usize, total_files: usize, source: &Path, error: &str) {
        let _ = (index, total_files, source, error);
    }

    /// Called once after every file has been attempted.
    fn on_render_complete(&self, total_files: usize, succeeded: usize) {
        let _ = (total_files, succeeded);
    }

    /// Called when an image is skipped during deck assembly.
    fn on_image_skipped(&self, image: &Path, reason: &str) {
        let _ = (image, reason);
    }

    /// Called after a deck has been written to disk.
    fn on_deck_written(&self, deck: &Path, slides: usize) {
        let _ = (deck, slides);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
