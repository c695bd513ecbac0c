//! In-memory model of a PowerPoint (`.pptx`) presentation.
//!
//! Only what alt-text annotation needs is modelled: the ordered slides, the
//! picture shapes on each slide, their embedded image bytes, and the two
//! places a description lives:
//!
//! | Channel | Where | Accessor |
//! |---------|-------|----------|
//! | direct property | [`Shape::alt_text`] | [`Shape::set_alt_text`] |
//! | properties node | `p:nvPicPr/p:cNvPr@descr` | [`Shape::picture_properties_mut`] |
//!
//! Every other part of the package is carried through untouched.
//!
//! ```text
//! .pptx ──▶ package (zip) ──▶ presentation.xml ──▶ slideN.xml ──▶ Shape
//!                                  (sldIdLst)          (p:pic)      (bytes via .rels)
//! ```

pub mod package;
pub mod rels;
pub mod slide;

use package::Package;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Failure to read or write the package structure.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("invalid ZIP container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML in part '{part}': {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("missing package part '{0}'")]
    MissingPart(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeckError {
    pub(crate) fn xml(part: &str, source: impl Into<quick_xml::Error>) -> Self {
        DeckError::Xml {
            part: part.to_string(),
            source: source.into(),
        }
    }
}

/// What kind of graphic frame a picture shape is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// An ordinary picture.
    Picture,
    /// A video or audio frame; the image is its poster frame.
    Media,
    /// A picture filling a layout placeholder.
    PlaceholderPicture,
}

/// Ordered attribute bag of a picture's `cNvPr` node.
///
/// Keys are qualified attribute names as they appear in the XML; values are
/// unescaped. Order is preserved so an unmodified node round-trips as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureProperties {
    attrs: Vec<(String, String)>,
}

impl PictureProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing it in place or appending it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn push(&mut self, key: String, value: String) {
        self.attrs.push((key, value));
    }
}

/// One top-level picture shape on a slide.
#[derive(Debug, Clone)]
pub struct Shape {
    pub(crate) name: String,
    pub(crate) kind: ShapeKind,
    pub(crate) image_part: Option<String>,
    pub(crate) alt_text: String,
    pub(crate) props: PictureProperties,
}

impl Shape {
    /// The shape's `name` attribute. Not unique within a slide.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// ZIP entry of the embedded image, when it resolves.
    pub fn image_part(&self) -> Option<&str> {
        self.image_part.as_deref()
    }

    /// Extension of the image part as declared by the container, or `png`.
    pub fn declared_extension(&self) -> String {
        self.image_part
            .as_deref()
            .and_then(|p| Path::new(p).extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "png".to_string())
    }

    /// Direct accessibility description.
    pub fn alt_text(&self) -> &str {
        &self.alt_text
    }

    pub fn set_alt_text(&mut self, text: impl Into<String>) {
        self.alt_text = text.into();
    }

    /// The lower-level `cNvPr` node.
    pub fn picture_properties(&self) -> &PictureProperties {
        &self.props
    }

    pub fn picture_properties_mut(&mut self) -> &mut PictureProperties {
        &mut self.props
    }
}

/// One slide, in presentation order.
#[derive(Debug, Clone)]
pub struct Slide {
    number: usize,
    part: String,
    shapes: Vec<Shape>,
    dirty: bool,
}

impl Slide {
    /// 1-based position in the deck.
    pub fn number(&self) -> usize {
        self.number
    }

    /// ZIP entry name of the slide part.
    pub fn part_name(&self) -> &str {
        &self.part
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Stable address of a shape within a loaded [`Presentation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeHandle {
    pub slide: usize,
    pub shape: usize,
}

/// A loaded presentation.
pub struct Presentation {
    package: Package,
    slides: Vec<Slide>,
}

impl Presentation {
    /// Read and parse a `.pptx` file.
    pub fn open(path: &Path) -> Result<Self, DeckError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Parse a `.pptx` held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DeckError> {
        let package = Package::read(bytes)?;
        let presentation_part = find_presentation_part(&package)?;
        let slide_parts = slide_parts(&package, &presentation_part)?;

        let mut slides = Vec::with_capacity(slide_parts.len());
        for (i, part) in slide_parts.into_iter().enumerate() {
            let xml = package.require(&part)?;
            let rels = match package.part(&rels::rels_path_for(&part)) {
                Some(data) => rels::parse_relationships(data, &part)?,
                None => Vec::new(),
            };
            let shapes = slide::parse_shapes(xml, &part, &rels)?;
            debug!("{}: {} picture shape(s)", part, shapes.len());
            slides.push(Slide {
                number: i + 1,
                part,
                shapes,
                dirty: false,
            });
        }

        Ok(Self { package, slides })
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn shape(&self, handle: ShapeHandle) -> Option<&Shape> {
        self.slides.get(handle.slide)?.shapes.get(handle.shape)
    }

    /// Mutable access to a shape; marks its slide for rewriting on save.
    pub fn shape_mut(&mut self, handle: ShapeHandle) -> Option<&mut Shape> {
        let slide = self.slides.get_mut(handle.slide)?;
        let shape = slide.shapes.get_mut(handle.shape)?;
        slide.dirty = true;
        Some(shape)
    }

    /// Raw bytes of a shape's embedded image.
    pub fn image_bytes(&self, shape: &Shape) -> Option<&[u8]> {
        self.package.part(shape.image_part.as_deref()?)
    }

    pub fn is_modified(&self) -> bool {
        self.slides.iter().any(|s| s.dirty)
    }

    /// Serialise, rewriting only slides that were modified.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        let mut rewritten = HashMap::new();
        for slide in self.slides.iter().filter(|s| s.dirty) {
            let xml = self.package.require(&slide.part)?;
            let updated = slide::rewrite_shapes(xml, &slide.part, &slide.shapes)?;
            rewritten.insert(slide.part.clone(), updated);
        }
        self.package.write_with(&rewritten)
    }

    /// Write to `path` atomically: a temp file in the same directory is
    /// renamed over the destination once fully written.
    pub fn save(&self, path: &Path) -> Result<(), DeckError> {
        use std::io::Write;

        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| DeckError::Io(e.error))?;
        Ok(())
    }
}

/// Locate the main presentation part through `_rels/.rels`, falling back to
/// the conventional name.
fn find_presentation_part(package: &Package) -> Result<String, DeckError> {
    if let Some(data) = package.part("_rels/.rels") {
        let root = rels::parse_relationships(data, "_rels/.rels")?;
        if let Some(rel) = root.iter().find(|r| r.rel_type == rels::OFFICE_DOCUMENT_REL) {
            return Ok(rels::resolve_target("", &rel.target));
        }
    }
    Ok("ppt/presentation.xml".to_string())
}

/// Slide part names in `p:sldIdLst` order.
fn slide_parts(package: &Package, presentation_part: &str) -> Result<Vec<String>, DeckError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let xml = package.require(presentation_part)?;
    let rels_part = rels::rels_path_for(presentation_part);
    let rels = rels::parse_relationships(package.require(&rels_part)?, &rels_part)?;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut parts = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.name().local_name().as_ref() == b"sldId" =>
            {
                for attr in e.attributes().flatten() {
                    // `id` is the numeric slide id; `r:id` the relationship.
                    if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                        let id = attr
                            .unescape_value()
                            .map_err(|source| DeckError::xml(presentation_part, source))?;
                        match rels::find(&rels, &id) {
                            Some(rel) => parts.push(rels::resolve_target(presentation_part, &rel.target)),
                            None => {
                                return Err(DeckError::MissingPart(format!(
                                    "{rels_part}#{id}"
                                )))
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(source) => return Err(DeckError::xml(presentation_part, source)),
            _ => {}
        }
        buf.clear();
    }
    Ok(parts)
}
