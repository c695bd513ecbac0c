//! Integration tests for the annotation pipeline.
//!
//! Decks are built in memory and descriptions come from closures, so these
//! run without network access, API keys or external converters.

mod common;

use common::{build_deck, pic, write_deck, JPEG_HEAD, PNG_HEAD, WMF_HEAD};
use edgequake_alttext::deck::{Presentation, ShapeHandle};
use edgequake_alttext::{
    annotate, annotate_sync, inspect, AltTextError, AnnotateConfig, AnnotationProgressCallback,
    NormalizingDescriber, ShapeError, ShapeStatus, ToolSet,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn config(images: &Path) -> AnnotateConfig {
    AnnotateConfig::builder().images_dir(images).build().unwrap()
}

/// Slide 1: PNG with alt text. Slide 2: JPEG without. Slide 3: empty.
fn three_slide_deck() -> Vec<u8> {
    build_deck(
        &[
            vec![pic("Picture 1", Some("Company logo"), "image1.png")],
            vec![pic("Picture 2", None, "image2.jpeg")],
            vec![],
        ],
        &[("image1.png", PNG_HEAD), ("image2.jpeg", JPEG_HEAD)],
    )
}

#[tokio::test]
async fn three_slide_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    let images = dir.path().join("images");

    let calls = Mutex::new(Vec::<PathBuf>::new());
    let describer = |p: &Path| {
        calls.lock().unwrap().push(p.to_path_buf());
        "A bar chart of quarterly revenue.".to_string()
    };

    let out = annotate(&input, &describer, &config(&images)).await.unwrap();
    let s = &out.stats;
    assert_eq!(s.total_slides, 3);
    assert_eq!(s.total_images, 2);
    assert_eq!(s.images_without_alt, 1);
    assert_eq!(s.images_with_alt, 1);
    assert_eq!(s.described, 1);
    assert!(s.modified);
    assert!(s.save_error.is_none());

    let output = dir.path().join("updated_talk.pptx");
    assert_eq!(s.output_path.as_deref(), Some(output.as_path()));
    assert!(output.exists());

    // Debug copies for both pictures, named by slide and shape.
    assert!(images.join("slide1_Picture 1.png").exists());
    assert!(images.join("slide2_Picture 2.jpeg").exists());
    assert_eq!(*calls.lock().unwrap(), vec![images.join("slide2_Picture 2.jpeg")]);

    // Both channels carry the description in the saved deck.
    let deck = Presentation::open(&output).unwrap();
    let shape = deck.shape(ShapeHandle { slide: 1, shape: 0 }).unwrap();
    assert_eq!(shape.alt_text(), "A bar chart of quarterly revenue.");
    assert_eq!(
        shape.picture_properties().get("descr"),
        Some("A bar chart of quarterly revenue.")
    );
    let untouched = deck.shape(ShapeHandle { slide: 0, shape: 0 }).unwrap();
    assert_eq!(untouched.alt_text(), "Company logo");

    assert_eq!(out.shapes.len(), 2);
    assert_eq!(out.shapes[0].status, ShapeStatus::AlreadyDescribed);
    assert_eq!(out.shapes[1].status, ShapeStatus::Described);
}

#[tokio::test]
async fn second_run_on_annotated_deck_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    let cfg = config(&dir.path().join("images"));
    let describer = |_: &Path| "A bar chart.".to_string();

    let first = annotate(&input, &describer, &cfg).await.unwrap();
    let updated = first.stats.output_path.unwrap();

    let second = annotate(&updated, &describer, &cfg).await.unwrap();
    assert_eq!(second.stats.images_without_alt, 0);
    assert_eq!(second.stats.images_with_alt, 2);
    assert!(!second.stats.modified);
    assert!(second.stats.output_path.is_none());
    assert!(!dir.path().join("updated_updated_talk.pptx").exists());
}

#[tokio::test]
async fn wmf_without_converters_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = build_deck(
        &[vec![pic("Clip Art 1", None, "image1.wmf")]],
        &[("image1.wmf", WMF_HEAD)],
    );
    let input = write_deck(dir.path(), "legacy.pptx", &bytes);

    let calls = AtomicUsize::new(0);
    let inner = |_: &Path| {
        calls.fetch_add(1, Ordering::SeqCst);
        "never".to_string()
    };
    let describer = NormalizingDescriber::new(inner, ToolSet::none());

    let out = annotate(&input, &describer, &config(&dir.path().join("images")))
        .await
        .unwrap();
    assert_eq!(out.stats.total_images, 1);
    assert_eq!(out.stats.images_without_alt, 1);
    assert_eq!(out.stats.images_with_alt, 0);
    assert!(!out.stats.modified);
    assert!(out.stats.output_path.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(
        out.shapes[0].status,
        ShapeStatus::Skipped(ShapeError::DescriptionEmpty { slide: 1, .. })
    ));
    assert!(!dir.path().join("updated_legacy.pptx").exists());
}

#[tokio::test]
async fn empty_description_leaves_deck_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    let describer = |_: &Path| "   ".to_string();

    let out = annotate(&input, &describer, &config(&dir.path().join("images")))
        .await
        .unwrap();
    assert_eq!(out.stats.images_without_alt, 1);
    assert_eq!(out.stats.described, 0);
    assert!(!out.stats.modified);
    assert!(!dir.path().join("updated_talk.pptx").exists());
}

#[tokio::test]
async fn debug_copy_failure_skips_shape_but_continues() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    // A regular file where the images directory should be.
    let blocked = dir.path().join("images");
    std::fs::write(&blocked, b"not a directory").unwrap();

    let calls = AtomicUsize::new(0);
    let describer = |_: &Path| {
        calls.fetch_add(1, Ordering::SeqCst);
        "unused".to_string()
    };

    let out = annotate(&input, &describer, &config(&blocked)).await.unwrap();
    assert_eq!(out.stats.total_images, 2);
    assert!(!out.stats.modified);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(out.skipped().count(), 2);
    assert!(out
        .shapes
        .iter()
        .all(|s| matches!(s.status, ShapeStatus::Skipped(ShapeError::DebugCopyFailed { .. }))));
}

#[tokio::test]
async fn failed_save_still_returns_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    // A non-empty directory where the output file should go.
    let blocked = dir.path().join("updated_talk.pptx");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep"), b"x").unwrap();
    let describer = |_: &Path| "A chart.".to_string();

    let out = annotate(&input, &describer, &config(&dir.path().join("images")))
        .await
        .unwrap();
    assert_eq!(out.stats.described, 1);
    assert!(out.stats.modified);
    assert!(out.stats.output_path.is_none());
    assert!(out.stats.save_error.is_some());
    assert!(blocked.is_dir());
}

#[tokio::test]
async fn unresolved_image_is_counted_but_not_described() {
    let dir = tempfile::tempdir().unwrap();
    // Neither media part is present in the package.
    let bytes = build_deck(
        &[vec![
            pic("Video 1", None, "missing1.png"),
            pic("Video 2", Some("Product demo"), "missing2.png"),
        ]],
        &[],
    );
    let input = write_deck(dir.path(), "media.pptx", &bytes);

    let calls = AtomicUsize::new(0);
    let describer = |_: &Path| {
        calls.fetch_add(1, Ordering::SeqCst);
        "unused".to_string()
    };

    let out = annotate(&input, &describer, &config(&dir.path().join("images")))
        .await
        .unwrap();
    assert_eq!(out.stats.total_images, 2);
    assert_eq!(out.stats.images_without_alt, 0);
    assert_eq!(out.stats.images_with_alt, 2);
    assert!(!out.stats.modified);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(
        &out.shapes[0].status,
        ShapeStatus::Skipped(ShapeError::MissingImage { slide: 1, shape }) if shape == "Video 1"
    ));
    assert_eq!(out.shapes[1].status, ShapeStatus::AlreadyDescribed);
    assert!(out.shapes.iter().all(|s| s.debug_path.is_none()));
}

#[tokio::test]
async fn same_named_shapes_on_one_slide_share_a_debug_copy() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = build_deck(
        &[vec![
            pic("Picture", None, "image1.png"),
            pic("Picture", None, "image2.png"),
        ]],
        &[("image1.png", PNG_HEAD), ("image2.png", &b"\x89PNG\r\n\x1a\nsecond"[..])],
    );
    let input = write_deck(dir.path(), "dupes.pptx", &bytes);
    let images = dir.path().join("images");
    let describer = |_: &Path| "A picture.".to_string();

    let out = annotate(&input, &describer, &config(&images)).await.unwrap();
    assert_eq!(out.stats.described, 2);
    let copy = std::fs::read(images.join("slide1_Picture.png")).unwrap();
    assert_eq!(copy, b"\x89PNG\r\n\x1a\nsecond");
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl AnnotationProgressCallback for Recorder {
    fn on_document_start(&self, total_slides: usize) {
        self.events.lock().unwrap().push(format!("start {total_slides}"));
    }
    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        self.events.lock().unwrap().push(format!("slide {slide}/{total_slides}"));
    }
    fn on_shape_described(&self, slide: usize, shape_name: &str, _len: usize) {
        self.events.lock().unwrap().push(format!("described {slide} {shape_name}"));
    }
    fn on_document_complete(&self, total_images: usize, described: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total_images} {described}"));
    }
}

#[tokio::test]
async fn progress_events_arrive_in_slide_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    let recorder = Arc::new(Recorder::default());
    let cfg = AnnotateConfig::builder()
        .images_dir(dir.path().join("images"))
        .progress_callback(Arc::clone(&recorder) as Arc<dyn AnnotationProgressCallback>)
        .build()
        .unwrap();
    let describer = |_: &Path| "A chart.".to_string();

    annotate(&input, &describer, &cfg).await.unwrap();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 3",
            "slide 1/3",
            "slide 2/3",
            "described 2 Picture 2",
            "slide 3/3",
            "done 2 1",
        ]
    );
}

#[tokio::test]
async fn non_presentation_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "slides.pptx", b"%PDF-1.7 not a deck");
    let describer = |_: &Path| String::new();

    let err = annotate(&input, &describer, &config(&dir.path().join("images")))
        .await
        .unwrap_err();
    assert!(matches!(err, AltTextError::NotAPresentation { .. }));
}

#[tokio::test]
async fn truncated_zip_is_reported_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = three_slide_deck();
    bytes.truncate(bytes.len() / 2);
    let input = write_deck(dir.path(), "broken.pptx", &bytes);
    let describer = |_: &Path| String::new();

    let err = annotate(&input, &describer, &config(&dir.path().join("images")))
        .await
        .unwrap_err();
    assert!(matches!(err, AltTextError::CorruptPresentation { .. }));
}

#[tokio::test]
async fn missing_file_is_fatal() {
    let describer = |_: &Path| String::new();
    let err = annotate("/no/such/deck.pptx", &describer, &AnnotateConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AltTextError::FileNotFound { .. }));
}

#[tokio::test]
async fn inspect_counts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = build_deck(
        &[
            vec![pic("Picture 1", Some("Logo"), "image1.png")],
            vec![pic("Clip", None, "image2.wmf"), pic("Photo", Some("   "), "image3.jpeg")],
        ],
        &[
            ("image1.png", PNG_HEAD),
            ("image2.wmf", WMF_HEAD),
            ("image3.jpeg", JPEG_HEAD),
        ],
    );
    let input = write_deck(dir.path(), "talk.pptx", &bytes);

    let summary = inspect(&input).await.unwrap();
    assert_eq!(summary.total_slides, 2);
    assert_eq!(summary.total_images, 3);
    assert_eq!(summary.images_without_alt, 2);
    assert_eq!(summary.images_with_alt, 1);
    assert_eq!(summary.legacy_metafiles, 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn annotate_sync_runs_without_an_outer_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    let describer = |_: &Path| "A chart.".to_string();

    let out = annotate_sync(&input, &describer, &config(&dir.path().join("images"))).unwrap();
    assert!(out.stats.modified);
}

#[test]
fn inspect_from_blocking_context() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_deck(dir.path(), "talk.pptx", &three_slide_deck());
    let summary = tokio_test::block_on(inspect(&input)).unwrap();
    assert_eq!(summary.total_images, 2);
    assert_eq!(summary.legacy_metafiles, 0);
}

#[test]
fn noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<edgequake_alttext::NoopProgressCallback>();
}
