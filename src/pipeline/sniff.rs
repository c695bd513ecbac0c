//! Content-based image format classification.
//!
//! Presentation packages regularly mislabel embedded pictures: a `.png`
//! part that is really an EMF, a metafile stored without an extension.
//! [`classify`] therefore trusts the bytes first and only looks at the file
//! name when no magic number matched.
//!
//! The checks run as a literal priority list. Order matters where magic
//! numbers overlap: the two-byte standard-WMF header `01 00` is a prefix of
//! the EMF record type `01 00 00 00`, so the WMF check refuses a buffer whose
//! next two bytes are zero and leaves it to the EMF check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Classified format of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Wmf,
    Emf,
    Unknown,
}

impl FormatTag {
    /// Raster formats the `image` crate (and every vision API) can decode.
    pub fn is_native(self) -> bool {
        matches!(
            self,
            FormatTag::Png | FormatTag::Jpeg | FormatTag::Gif | FormatTag::Webp | FormatTag::Bmp
        )
    }

    /// Windows metafiles that need an external converter.
    pub fn is_legacy_vector(self) -> bool {
        matches!(self, FormatTag::Wmf | FormatTag::Emf)
    }

    /// Canonical lowercase file extension.
    pub fn extension(self) -> &'static str {
        match self {
            FormatTag::Png => "png",
            FormatTag::Jpeg => "jpg",
            FormatTag::Gif => "gif",
            FormatTag::Webp => "webp",
            FormatTag::Bmp => "bmp",
            FormatTag::Wmf => "wmf",
            FormatTag::Emf => "emf",
            FormatTag::Unknown => "bin",
        }
    }

    /// Whether `ext` (without dot, any case) is a spelling of this format.
    pub fn matches_extension(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            FormatTag::Jpeg => ext == "jpg" || ext == "jpeg",
            other => ext == other.extension(),
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::Png => "PNG",
            FormatTag::Jpeg => "JPEG",
            FormatTag::Gif => "GIF",
            FormatTag::Webp => "WEBP",
            FormatTag::Bmp => "BMP",
            FormatTag::Wmf => "WMF",
            FormatTag::Emf => "EMF",
            FormatTag::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const WMF_PLACEABLE_MAGIC: &[u8] = &[0xD7, 0xCD, 0xC6, 0x9A];
const WMF_STANDARD_MAGIC: &[u8] = &[0x01, 0x00];
const EMF_MAGIC: &[u8] = &[0x01, 0x00, 0x00, 0x00];

/// Classify `bytes`, consulting `filename` only when no signature matched.
///
/// Never fails: anything unrecognised is [`FormatTag::Unknown`].
pub fn classify(bytes: &[u8], filename: Option<&str>) -> FormatTag {
    if bytes.starts_with(PNG_MAGIC) {
        return FormatTag::Png;
    }
    if bytes.starts_with(JPEG_MAGIC) {
        return FormatTag::Jpeg;
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return FormatTag::Gif;
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return FormatTag::Webp;
    }
    if bytes.starts_with(b"BM") {
        return FormatTag::Bmp;
    }
    if bytes.starts_with(WMF_PLACEABLE_MAGIC) {
        return FormatTag::Wmf;
    }
    // Standard WMF and EMF share `01 00`; the next two bytes decide, and
    // without them neither is trusted.
    if bytes.len() >= 4 && bytes.starts_with(WMF_STANDARD_MAGIC) {
        if !bytes.starts_with(EMF_MAGIC) {
            return FormatTag::Wmf;
        }
        if bytes.len() >= 8 {
            return FormatTag::Emf;
        }
    }

    match filename.and_then(extension_of).as_deref() {
        Some("wmf") => FormatTag::Wmf,
        Some("emf") => FormatTag::Emf,
        _ => FormatTag::Unknown,
    }
}

/// Read the head of a file and classify it.
pub fn classify_file(path: &Path) -> std::io::Result<FormatTag> {
    use std::io::Read;
    let mut head = Vec::with_capacity(16);
    std::fs::File::open(path)?.take(16).read_to_end(&mut head)?;
    Ok(classify(&head, path.file_name().and_then(|n| n.to_str())))
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
