//! # edgequake-alttext
//!
//! Add accessibility descriptions ("alt text") to the pictures in PowerPoint
//! decks using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Slide decks are full of screenshots, charts and clip-art that screen
//! readers announce as "picture". This crate finds every picture without a
//! description, asks a vision model to describe it and writes the answer
//! into both places PowerPoint readers look, leaving pictures that are
//! already described untouched.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .pptx
//!  │
//!  ├─ 1. Input     check the file exists and is a ZIP package
//!  ├─ 2. Scan      slides in order → picture shapes → image bytes + alt text
//!  ├─ 3. Sniff     true format from magic bytes (PNG … WMF, EMF)
//!  ├─ 4. Convert   WMF/EMF → PNG via ImageMagick, then LibreOffice
//!  ├─ 5. Describe  resize, base64, vision model, cleanup
//!  └─ 6. Output    descriptions written back; updated_<name>.pptx + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_alttext::{annotate_file, AnnotateConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AnnotateConfig::default();
//!     let output = annotate_file("talk.pptx", &config).await?;
//!     println!(
//!         "{} of {} images described",
//!         output.stats.described, output.stats.total_images
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Any [`Describer`] can stand in for the vision model, including a plain
//! closure:
//!
//! ```rust,no_run
//! use edgequake_alttext::{annotate, AnnotateConfig};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), edgequake_alttext::AltTextError> {
//! let canned = |_: &Path| "Company logo".to_string();
//! let output = annotate("talk.pptx", &canned, &AnnotateConfig::default()).await?;
//! # Ok(()) }
//! ```
//!
//! ## Legacy metafiles
//!
//! WMF and EMF pictures (common in older clip-art) cannot be decoded by the
//! `image` crate or sent to a vision API. They are rasterised with
//! ImageMagick (`magick`/`convert`) or, for WMF, LibreOffice (`soffice`)
//! when either is installed; see the `converter-probe` crate. When neither
//! is present the picture is skipped with install instructions in the log.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `alttext` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod config;
pub mod deck;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use annotate::{annotate, annotate_file, annotate_sync, inspect};
pub use config::{AnnotateConfig, AnnotateConfigBuilder};
pub use converter_probe::{ConverterDescriptor, OsFamily, ToolId, ToolSet};
pub use error::{AltTextError, ConversionError, ShapeError};
pub use output::{AnnotationOutput, DeckSummary, ShapeResult, ShapeStatus, SlideStats};
pub use pipeline::describe::{describer_from_config, Describer, LlmDescriber, NormalizingDescriber};
pub use pipeline::metafile::MetafileConverter;
pub use pipeline::sniff::{classify, FormatTag};
pub use progress::{AnnotationProgressCallback, NoopProgressCallback, ProgressCallback};
