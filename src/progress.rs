//! Progress-callback trait for per-slide annotation events.
//!
//! Inject an [`Arc<dyn AnnotationProgressCallback>`] via
//! [`crate::config::AnnotateConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the deck.
//!
//! Notifications are fire-and-forget: the pipeline never waits on them and
//! never inspects a result. A receiver that forwards to a channel must not
//! block inside the callback.
//!
//! # Example
//!
//! ```rust
//! use edgequake_alttext::{AnnotateConfig, AnnotationProgressCallback};
//! use std::sync::Arc;
//!
//! struct SlideLogger;
//!
//! impl AnnotationProgressCallback for SlideLogger {
//!     fn on_slide_start(&self, slide: usize, total_slides: usize) {
//!         eprintln!("Processing slide {slide}/{total_slides}");
//!     }
//! }
//!
//! let config = AnnotateConfig::builder()
//!     .progress_callback(Arc::new(SlideLogger) as Arc<dyn AnnotationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the annotation pipeline as it walks a deck.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnnotationProgressCallback: Send + Sync {
    /// Called once after the deck is loaded, before the first slide.
    fn on_document_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called once per slide before any of its pictures are processed.
    ///
    /// # Arguments
    /// * `slide`:        1-indexed slide number
    /// * `total_slides`: slides in the deck
    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        let _ = (slide, total_slides);
    }

    /// Called when a picture received a new description.
    fn on_shape_described(&self, slide: usize, shape_name: &str, description_len: usize) {
        let _ = (slide, shape_name, description_len);
    }

    /// Called when a picture lacking alt text could not be annotated.
    fn on_shape_skipped(&self, slide: usize, shape_name: &str, reason: &str) {
        let _ = (slide, shape_name, reason);
    }

    /// Called once after the last slide.
    ///
    /// # Arguments
    /// * `total_images`: pictures seen in the deck
    /// * `described`:    pictures that received a new description
    fn on_document_complete(&self, total_images: usize, described: usize) {
        let _ = (total_images, described);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnnotationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnnotateConfig`].
pub type ProgressCallback = Arc<dyn AnnotationProgressCallback>;
