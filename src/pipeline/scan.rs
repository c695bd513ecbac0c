//! Shape scanner: walk a loaded deck slide by slide and yield one
//! [`ShapeRecord`] per in-scope picture shape.
//!
//! The scanner is a cursor, not an iterator over borrowed data: it borrows
//! the [`Presentation`] only for the duration of each [`ShapeScanner::next_event`]
//! call, so the caller can mutate the deck (write alt text back) between
//! records. It only moves forward; there is no way to rewind it.

use crate::deck::{Presentation, Shape, ShapeHandle, ShapeKind};

/// One picture shape as seen by the annotation pipeline.
///
/// The image bytes are an owned copy; everything else is a view of the
/// shape at the moment it was scanned.
#[derive(Debug, Clone)]
pub struct ShapeRecord {
    /// 1-based slide number.
    pub slide_number: usize,
    /// Address of the shape in the deck, for writing back.
    pub handle: ShapeHandle,
    pub name: String,
    pub kind: ShapeKind,
    /// Embedded image bytes; `None` when the relationship does not resolve.
    pub image: Option<Vec<u8>>,
    /// Extension declared by the container, lowercase, `png` when absent.
    pub declared_ext: String,
    /// Existing description, trimmed. Empty means missing.
    pub existing_alt: String,
}

impl ShapeRecord {
    pub fn has_alt_text(&self) -> bool {
        !self.existing_alt.is_empty()
    }
}

/// What the scanner produced next.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Emitted once per slide, before that slide's shapes.
    Slide { number: usize, total: usize },
    Shape(ShapeRecord),
}

/// Forward-only cursor over slides and their picture shapes.
#[derive(Debug, Default)]
pub struct ShapeScanner {
    slide: usize,
    shape: usize,
    announced: bool,
}

impl ShapeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next slide marker or shape; `None` once every slide
    /// has been visited.
    pub fn next_event(&mut self, deck: &Presentation) -> Option<ScanEvent> {
        let total = deck.slides().len();
        loop {
            let slide = deck.slides().get(self.slide)?;

            if !self.announced {
                self.announced = true;
                return Some(ScanEvent::Slide {
                    number: slide.number(),
                    total,
                });
            }

            if let Some(shape) = slide.shapes().get(self.shape) {
                let handle = ShapeHandle {
                    slide: self.slide,
                    shape: self.shape,
                };
                self.shape += 1;
                return Some(ScanEvent::Shape(ShapeRecord {
                    slide_number: slide.number(),
                    handle,
                    name: shape.name().to_string(),
                    kind: shape.kind(),
                    image: deck.image_bytes(shape).map(<[u8]>::to_vec),
                    declared_ext: shape.declared_extension(),
                    existing_alt: existing_alt_text(shape),
                }));
            }

            self.slide += 1;
            self.shape = 0;
            self.announced = false;
        }
    }
}

/// Resolve a shape's existing description: the direct property first, then
/// the `descr` attribute of its properties node. Whitespace-only counts as
/// missing.
pub fn existing_alt_text(shape: &Shape) -> String {
    let direct = shape.alt_text().trim();
    if !direct.is_empty() {
        return direct.to_string();
    }
    shape
        .picture_properties()
        .get("descr")
        .map(str::trim)
        .unwrap_or("")
        .to_string()
}
