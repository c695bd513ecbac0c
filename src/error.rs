//! Error types for the edgequake-alttext library.
//!
//! Three error types mirror the three places a run can go wrong:
//!
//! * [`AltTextError`]: **Fatal**. The document cannot be processed at all
//!   (missing file, not a presentation, provider not configured). Returned as
//!   `Err(AltTextError)` from [`crate::annotate()`] and friends; no statistics
//!   are produced.
//!
//! * [`ShapeError`]: **Non-fatal**. One picture could not be annotated
//!   (debug copy failed, empty description). Stored inside
//!   [`crate::output::ShapeResult`] so the rest of the deck is still processed.
//!
//! * [`ConversionError`]: the WMF/EMF conversion chain ran out of options.
//!   It carries the remediation text for the host OS and is absorbed at the
//!   describer boundary, so it only ever costs a single picture.
//!
//! A failed save after successful annotation is deliberately *not* an error
//! value: the statistics are still returned, with
//! [`crate::output::SlideStats::save_error`] set.

use crate::pipeline::sniff::FormatTag;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-alttext library.
#[derive(Debug, Error)]
pub enum AltTextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Presentation not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a ZIP-based presentation.
    #[error("File is not a PowerPoint (.pptx) document: '{path}'\nFirst bytes: {magic:?}")]
    NotAPresentation { path: PathBuf, magic: [u8; 4] },

    // ── Container errors ──────────────────────────────────────────────────
    /// The package opened but its parts could not be parsed.
    #[error("Presentation '{path}' is corrupt: {detail}")]
    CorruptPresentation { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single picture.
///
/// Stored alongside [`crate::output::ShapeResult`] when a shape is skipped.
/// The scan always continues with the next shape.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ShapeError {
    /// The shape references no image part (e.g. a media frame without a poster).
    #[error("Slide {slide}: '{shape}' has no embedded image")]
    MissingImage { slide: usize, shape: String },

    /// Writing the debug copy to the images directory failed.
    #[error("Slide {slide}: could not save debug copy of '{shape}': {detail}")]
    DebugCopyFailed {
        slide: usize,
        shape: String,
        detail: String,
    },

    /// The description capability returned nothing.
    #[error("Slide {slide}: no description produced for '{shape}'")]
    DescriptionEmpty { slide: usize, shape: String },

    /// The description could not be attached to the shape.
    #[error("Slide {slide}: could not write alt text for '{shape}': {detail}")]
    WriteBackFailed {
        slide: usize,
        shape: String,
        detail: String,
    },
}

/// Failure of the legacy-metafile conversion chain.
///
/// Every variant's message is actionable on its own: it names the tool that
/// is missing or failed and how to install it on this OS.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No converter is installed at all.
    #[error("Cannot convert {format} image: no converter found.\n{hint}")]
    NoConverter { format: FormatTag, hint: String },

    /// The chain was asked to convert something that is not WMF/EMF.
    #[error("{0} is not a legacy metafile format; nothing to convert")]
    UnsupportedFormat(FormatTag),

    /// Creating a temporary input or scratch directory failed.
    #[error("Failed to stage {format} image for conversion: {source}")]
    Staging {
        format: FormatTag,
        #[source]
        source: std::io::Error,
    },

    /// Every viable attempt failed.
    #[error(
        "Failed to convert {format} image after {attempts} attempt(s).\n\
         {remediation}"
    )]
    Exhausted {
        format: FormatTag,
        attempts: usize,
        libreoffice_installed: bool,
        remediation: String,
    },
}
