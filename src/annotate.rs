//! Annotation entry points: walk a deck, describe pictures that lack alt
//! text, write the descriptions back and save a copy.
//!
//! ## Per-shape procedure
//!
//! ```text
//! ShapeRecord ──▶ debug copy ──▶ existing alt? ──yes──▶ AlreadyDescribed
//!                 (images/)           │ no
//!                                     ▼
//!                               Describer ──""──▶ Skipped(DescriptionEmpty)
//!                                     │ text
//!                                     ▼
//!                     alt_text + cNvPr@descr ──▶ Described (deck dirty)
//! ```
//!
//! Nothing that goes wrong with a single picture stops the scan. Only an
//! unreadable input aborts the run.

use crate::config::AnnotateConfig;
use crate::deck::{Presentation, ShapeKind};
use crate::error::{AltTextError, ShapeError};
use crate::output::{AnnotationOutput, DeckSummary, ShapeResult, ShapeStatus, SlideStats};
use crate::pipeline::describe::{describer_from_config, Describer};
use crate::pipeline::input::{output_path_for, resolve_input};
use crate::pipeline::scan::{ScanEvent, ShapeRecord, ShapeScanner};
use crate::pipeline::sniff::{classify, FormatTag};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Annotate the presentation at `path`.
///
/// Pictures without a description are passed to `describer` through their
/// debug copy in [`AnnotateConfig::images_dir`]. When at least one picture
/// was described the deck is saved beside the input as
/// `{output_prefix}{file name}`.
///
/// # Errors
/// Returns `Err(AltTextError)` only when the input is missing, unreadable or
/// not a valid `.pptx`. Per-picture problems are reported in
/// [`AnnotationOutput::shapes`]; a failed save in [`SlideStats::save_error`].
pub async fn annotate<D: Describer>(
    path: impl AsRef<Path>,
    describer: &D,
    config: &AnnotateConfig,
) -> Result<AnnotationOutput, AltTextError> {
    let start = Instant::now();
    let path = resolve_input(path)?;
    info!("Annotating {}", path.display());

    let mut deck = load(&path).await?;
    let total_slides = deck.slides().len();

    if let Err(e) = tokio::fs::create_dir_all(&config.images_dir).await {
        // Every debug copy will fail and be reported per shape.
        warn!("Cannot create {}: {}", config.images_dir.display(), e);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(total_slides);
    }

    let mut stats = SlideStats {
        total_slides,
        ..Default::default()
    };
    let mut shapes = Vec::new();
    let mut scanner = ShapeScanner::new();

    while let Some(event) = scanner.next_event(&deck) {
        let record = match event {
            ScanEvent::Slide { number, total } => {
                debug!("Checking slide {}/{}", number, total);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_slide_start(number, total);
                }
                continue;
            }
            ScanEvent::Shape(record) => record,
        };

        stats.total_images += 1;
        let result = process_shape(&mut deck, record, describer, config, &mut stats).await;

        if let Some(ref cb) = config.progress_callback {
            match &result.status {
                ShapeStatus::Described => {
                    cb.on_shape_described(result.slide_number, &result.shape_name, result.alt_text.len())
                }
                ShapeStatus::Skipped(e) => {
                    cb.on_shape_skipped(result.slide_number, &result.shape_name, &e.to_string())
                }
                ShapeStatus::AlreadyDescribed => {}
            }
        }
        shapes.push(result);
    }

    stats.images_with_alt = stats.total_images - stats.images_without_alt;
    stats.modified = deck.is_modified();

    if stats.modified {
        let output = output_path_for(&path, &config.output_prefix);
        match save(deck, output.clone()).await {
            Ok(()) => {
                info!("Saved updated presentation to {}", output.display());
                stats.output_path = Some(output);
            }
            Err(e) => {
                warn!("Could not save {}: {}", output.display(), e);
                stats.save_error = Some(e);
            }
        }
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "{}: {} slides, {} images, {} without alt text, {} described in {}ms",
        path.display(),
        stats.total_slides,
        stats.total_images,
        stats.images_without_alt,
        stats.described,
        stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_complete(stats.total_images, stats.described);
    }

    Ok(AnnotationOutput { stats, shapes })
}

/// Annotate with the vision provider and converters resolved from `config`
/// and the environment.
pub async fn annotate_file(
    path: impl AsRef<Path>,
    config: &AnnotateConfig,
) -> Result<AnnotationOutput, AltTextError> {
    let describer = describer_from_config(config)?;
    annotate(path, &describer, config).await
}

/// Synchronous wrapper around [`annotate`].
///
/// Creates a temporary tokio runtime internally.
pub fn annotate_sync<D: Describer>(
    path: impl AsRef<Path>,
    describer: &D,
    config: &AnnotateConfig,
) -> Result<AnnotationOutput, AltTextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AltTextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(annotate(path, describer, config))
}

/// Count slides and pictures without describing or writing anything.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DeckSummary, AltTextError> {
    let path = resolve_input(path)?;
    let deck = load(&path).await?;

    let mut summary = DeckSummary {
        total_slides: deck.slides().len(),
        ..Default::default()
    };
    let mut scanner = ShapeScanner::new();
    while let Some(event) = scanner.next_event(&deck) {
        if let ScanEvent::Shape(record) = event {
            summary.total_images += 1;
            if !record.has_alt_text() {
                summary.images_without_alt += 1;
            }
            let format = record
                .image
                .as_deref()
                .map(|bytes| classify(bytes, record_filename(&record).as_deref()));
            if format.is_some_and(FormatTag::is_legacy_vector) {
                summary.legacy_metafiles += 1;
            }
        }
    }
    summary.images_with_alt = summary.total_images - summary.images_without_alt;
    Ok(summary)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

async fn load(path: &Path) -> Result<Presentation, AltTextError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || Presentation::open(&owned))
        .await
        .map_err(|e| AltTextError::Internal(format!("deck loader panicked: {e}")))?
        .map_err(|e| AltTextError::CorruptPresentation {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

async fn save(deck: Presentation, output: PathBuf) -> Result<(), String> {
    tokio::task::spawn_blocking(move || deck.save(&output))
        .await
        .map_err(|e| format!("save task panicked: {e}"))?
        .map_err(|e| e.to_string())
}

async fn process_shape<D: Describer>(
    deck: &mut Presentation,
    record: ShapeRecord,
    describer: &D,
    config: &AnnotateConfig,
    stats: &mut SlideStats,
) -> ShapeResult {
    let slide = record.slide_number;
    let mut result = ShapeResult {
        slide_number: slide,
        shape_name: record.name.clone(),
        kind: record.kind,
        format: None,
        debug_path: None,
        alt_text: record.existing_alt.clone(),
        status: ShapeStatus::AlreadyDescribed,
    };
    debug!("Slide {}: {:?} '{}'", slide, record.kind, record.name);

    // Debug copy. A shape that cannot produce one is never described.
    let debug_path = match record.image.as_deref() {
        Some(bytes) => {
            result.format = Some(classify(bytes, record_filename(&record).as_deref()));
            let target = debug_copy_path(&config.images_dir, &record);
            match tokio::fs::write(&target, bytes).await {
                Ok(()) => {
                    debug!("Saved image to {}", target.display());
                    result.debug_path = Some(target.clone());
                    target
                }
                Err(e) => {
                    warn!("Slide {}: could not save image '{}': {}", slide, record.name, e);
                    result.status = ShapeStatus::Skipped(ShapeError::DebugCopyFailed {
                        slide,
                        shape: record.name,
                        detail: e.to_string(),
                    });
                    return result;
                }
            }
        }
        None if record.has_alt_text() => return result,
        None => {
            let kind = match record.kind {
                ShapeKind::Media => "media frame",
                _ => "picture",
            };
            warn!("Slide {}: {} '{}' has no embedded image", slide, kind, record.name);
            result.status = ShapeStatus::Skipped(ShapeError::MissingImage {
                slide,
                shape: record.name,
            });
            return result;
        }
    };

    if record.has_alt_text() {
        debug!("Slide {}: existing alt text for '{}'", slide, record.name);
        return result;
    }

    stats.images_without_alt += 1;
    info!("Slide {}: generating alt text for '{}'", slide, record.name);

    let description = describer.describe(&debug_path).await.trim().to_string();
    if description.is_empty() {
        warn!("Slide {}: no description produced for '{}'", slide, record.name);
        result.status = ShapeStatus::Skipped(ShapeError::DescriptionEmpty {
            slide,
            shape: record.name,
        });
        return result;
    }

    match deck.shape_mut(record.handle) {
        Some(shape) => {
            shape.set_alt_text(description.clone());
            shape.picture_properties_mut().set("descr", description.clone());
        }
        None => {
            warn!("Slide {}: shape '{}' vanished before write-back", slide, record.name);
            result.status = ShapeStatus::Skipped(ShapeError::WriteBackFailed {
                slide,
                shape: record.name,
                detail: "shape no longer present in the deck".to_string(),
            });
            return result;
        }
    }

    debug!("Slide {}: '{}' → {}", slide, record.name, description);
    stats.described += 1;
    result.alt_text = description;
    result.status = ShapeStatus::Described;
    result
}

/// `slide{N}_{name}.{ext}` with path separators in the name replaced.
///
/// Identically named shapes on the same slide share a path; the last
/// write wins.
fn debug_copy_path(images_dir: &Path, record: &ShapeRecord) -> PathBuf {
    let name: String = record
        .name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    images_dir.join(format!(
        "slide{}_{}.{}",
        record.slide_number, name, record.declared_ext
    ))
}

/// Name used as the extension fallback when content sniffing is inconclusive.
fn record_filename(record: &ShapeRecord) -> Option<String> {
    Some(format!("image.{}", record.declared_ext))
}
