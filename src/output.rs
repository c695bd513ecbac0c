//! Result types returned by the annotation pipeline.

use crate::deck::ShapeKind;
use crate::error::ShapeError;
use crate::pipeline::sniff::FormatTag;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Aggregate statistics for one document.
///
/// `images_with_alt` is always `total_images - images_without_alt`.
/// Callers must check both `modified` and `output_path`: a document can be
/// modified in memory and still have no output when the save failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideStats {
    pub total_slides: usize,
    pub total_images: usize,
    pub images_without_alt: usize,
    pub images_with_alt: usize,
    /// Shapes that received a generated description.
    pub described: usize,
    pub modified: bool,
    /// Where the updated document was written, when it was.
    pub output_path: Option<PathBuf>,
    /// Why the save failed, when it did.
    pub save_error: Option<String>,
    pub duration_ms: u64,
}

/// What happened to one picture shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ShapeStatus {
    /// It already had a non-empty description; left alone.
    AlreadyDescribed,
    /// A description was generated and written back.
    Described,
    Skipped(ShapeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeResult {
    /// 1-based.
    pub slide_number: usize,
    pub shape_name: String,
    pub kind: ShapeKind,
    /// Content-sniffed format; `None` when the shape had no image bytes.
    pub format: Option<FormatTag>,
    pub debug_path: Option<PathBuf>,
    /// Final alt text on the shape (existing or generated).
    pub alt_text: String,
    pub status: ShapeStatus,
}

/// Complete result of [`crate::annotate()`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationOutput {
    pub stats: SlideStats,
    /// One entry per picture shape, in scan order.
    pub shapes: Vec<ShapeResult>,
}

impl AnnotationOutput {
    /// Shapes that were skipped, with the reason.
    pub fn skipped(&self) -> impl Iterator<Item = (&ShapeResult, &ShapeError)> {
        self.shapes.iter().filter_map(|s| match &s.status {
            ShapeStatus::Skipped(e) => Some((s, e)),
            _ => None,
        })
    }
}

/// Scan-only summary returned by [`crate::inspect()`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSummary {
    pub total_slides: usize,
    pub total_images: usize,
    pub images_without_alt: usize,
    pub images_with_alt: usize,
    /// Pictures whose bytes are WMF/EMF and will need an external converter.
    pub legacy_metafiles: usize,
}
