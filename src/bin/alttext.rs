//! CLI binary for edgequake-alttext.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnnotateConfig`, runs each deck through the pipeline and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_alttext::{
    annotate, describer_from_config, inspect, AnnotateConfig, AnnotationOutput,
    AnnotationProgressCallback, DeckSummary, OsFamily, ProgressCallback, ToolSet,
};
use converter_probe::install_hint;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a slide progress bar plus one log line per
/// picture that was described or skipped.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_document_start` reports the slide count.
    fn new(file: &Path) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message(format!("Opening {}…", file.display()));
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl AnnotationProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_slides: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_slides as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Annotating");
        self.bar.reset_eta();
    }

    fn on_slide_start(&self, slide: usize, _total_slides: usize) {
        self.bar.set_position(slide.saturating_sub(1) as u64);
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_shape_described(&self, slide: usize, shape_name: &str, description_len: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}  {:<24}  {}",
            green("✓"),
            slide,
            shape_name,
            dim(&format!("{description_len:>4} chars")),
        ));
    }

    fn on_shape_skipped(&self, slide: usize, shape_name: &str, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        // Keep one line per picture even for multi-line conversion errors.
        let reason = reason.lines().next().unwrap_or(reason);
        let msg = if reason.chars().count() > 80 {
            format!("{}…", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}  {:<24}  {}",
            red("✗"),
            slide,
            shape_name,
            red(&msg),
        ));
    }

    fn on_document_complete(&self, _total_images: usize, _described: usize) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Describe every picture without alt text (writes updated_talk.pptx)
  alttext talk.pptx

  # Several decks; one failure does not stop the others
  alttext deck1.pptx deck2.pptx deck3.pptx

  # Copy the updated deck somewhere else
  alttext talk.pptx -o accessible/talk.pptx

  # Use a specific model
  alttext --model gpt-4.1-mini --provider openai talk.pptx

  # Count pictures and missing descriptions (no API key needed)
  alttext --inspect-only talk.pptx

  # Check which WMF/EMF converters are installed
  alttext --tools

  # JSON output with per-picture results
  alttext --json talk.pptx > report.json

LEGACY CLIP-ART (WMF/EMF):
  Converted to PNG with ImageMagick (magick, or convert v6) and, for WMF,
  LibreOffice (soffice) as a fallback. Without either, those pictures are
  skipped and the log explains how to install one.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  ALTTEXT_MAGICK_PATH     Use this ImageMagick binary instead of searching PATH
  ALTTEXT_SOFFICE_PATH    Use this LibreOffice binary instead of searching PATH

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Annotate:        alttext talk.pptx
"#;

/// Add accessibility alt text to pictures in PowerPoint decks using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "alttext",
    version,
    about = "Add accessibility alt text to pictures in PowerPoint decks using Vision LLMs",
    long_about = "Find every picture without a description in one or more .pptx files, \
describe it with a Vision Language Model and save an updated copy beside the original. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint \
(Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// One or more .pptx files.
    #[arg(required_unless_present = "tools")]
    inputs: Vec<PathBuf>,

    /// Also copy the updated deck here (single input only).
    #[arg(short, long, env = "ALTTEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory receiving a copy of every extracted image.
    #[arg(long, env = "ALTTEXT_IMAGES_DIR", default_value = "images")]
    images_dir: PathBuf,

    /// File-name prefix of the updated deck.
    #[arg(long, env = "ALTTEXT_PREFIX", default_value = "updated_")]
    prefix: String,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom description prompt.
    #[arg(long, env = "ALTTEXT_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Max LLM output tokens per picture.
    #[arg(long, env = "ALTTEXT_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ALTTEXT_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per picture on LLM failure.
    #[arg(long, env = "ALTTEXT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-picture LLM call timeout in seconds.
    #[arg(long, env = "ALTTEXT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Count pictures and missing descriptions only; no API calls, no writes.
    #[arg(long)]
    inspect_only: bool,

    /// Report which WMF/EMF converters are installed, then exit.
    #[arg(long)]
    tools: bool,

    /// Output structured JSON instead of the summary block.
    #[arg(long, env = "ALTTEXT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ALTTEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ALTTEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ALTTEXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports per-picture outcomes; INFO logs
    // would only scroll it away.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Tool report ──────────────────────────────────────────────────────
    if cli.tools {
        print_tools(&ToolSet::probe(), cli.json)?;
        return Ok(());
    }

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output can only be used with a single input file");
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut failed = 0;
        for input in &cli.inputs {
            match inspect(input).await {
                Ok(summary) => print_inspect(input, &summary, cli.json)?,
                Err(e) => {
                    failed += 1;
                    eprintln!("{} {}: {}", red("✘"), input.display(), e);
                }
            }
        }
        if failed > 0 {
            anyhow::bail!("{failed} of {} file(s) could not be inspected", cli.inputs.len());
        }
        return Ok(());
    }

    // ── Build config and describer ───────────────────────────────────────
    let base = build_config(&cli).await?;
    let describer = describer_from_config(&base).context("Failed to set up the vision provider")?;

    // ── Annotate each deck independently ─────────────────────────────────
    let mut failed = 0;
    for input in &cli.inputs {
        let mut config = base.clone();
        let progress = show_progress.then(|| CliProgressCallback::new(input));
        if let Some(ref cb) = progress {
            config.progress_callback = Some(Arc::clone(cb) as ProgressCallback);
        }

        let result = annotate(input, &describer, &config).await;
        if let Some(cb) = progress {
            cb.bar.finish_and_clear();
        }

        match result {
            Ok(output) => {
                if let Some(ref dest) = cli.output {
                    copy_output(&output, dest).await?;
                }
                if cli.json {
                    let json = serde_json::to_string_pretty(&output)
                        .context("Failed to serialise output")?;
                    println!("{json}");
                } else if !cli.quiet {
                    print_summary(input, &output);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", red("✘"), input.display(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} document(s) failed", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args to `AnnotateConfig`.
async fn build_config(cli: &Cli) -> Result<AnnotateConfig> {
    let mut builder = AnnotateConfig::builder()
        .images_dir(&cli.images_dir)
        .output_prefix(&cli.prefix)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt.trim());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }

    builder.build().context("Invalid configuration")
}

async fn copy_output(output: &AnnotationOutput, dest: &Path) -> Result<()> {
    let Some(ref updated) = output.stats.output_path else {
        return Ok(());
    };
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::copy(updated, dest)
        .await
        .with_context(|| format!("Failed to copy updated deck to {}", dest.display()))?;
    Ok(())
}

fn print_summary(input: &Path, output: &AnnotationOutput) {
    let s = &output.stats;
    let skipped = output.skipped().count();

    eprintln!(
        "{} {}",
        if skipped == 0 { green("✔") } else { cyan("⚠") },
        bold(&input.display().to_string())
    );
    eprintln!("   Total slides:            {}", s.total_slides);
    eprintln!("   Total images:            {}", s.total_images);
    eprintln!("   Images with alt text:    {}", s.images_with_alt);
    eprintln!("   Images without alt text: {}", s.images_without_alt);
    eprintln!("   Described now:           {}", s.described);
    if skipped > 0 {
        eprintln!("   Skipped:                 {}", red(&skipped.to_string()));
    }
    match (&s.output_path, &s.save_error) {
        (Some(path), _) => eprintln!("   {}  {}", dim("saved →"), bold(&path.display().to_string())),
        (None, Some(err)) => eprintln!("   {} {}", red("save failed:"), err),
        (None, None) => eprintln!("   {}", dim("no changes; nothing written")),
    }
    eprintln!("   {}", dim(&format!("{}ms", s.duration_ms)));
}

fn print_inspect(input: &Path, summary: &DeckSummary, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("Failed to serialize summary")?
        );
        return Ok(());
    }
    println!("File:                     {}", input.display());
    println!("Slides:                   {}", summary.total_slides);
    println!("Images:                   {}", summary.total_images);
    println!("With alt text:            {}", summary.images_with_alt);
    println!("Without alt text:         {}", summary.images_without_alt);
    println!("WMF/EMF (need converter): {}", summary.legacy_metafiles);
    Ok(())
}

fn print_tools(tools: &ToolSet, json: bool) -> Result<()> {
    let os = OsFamily::current();
    if json {
        let report: Vec<_> = tools
            .descriptors()
            .iter()
            .map(|d| {
                serde_json::json!({
                    "tool": d.tool.as_str(),
                    "available": d.available,
                    "path": d.path,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize tool report")?
        );
        return Ok(());
    }

    println!("{} ({})", bold("Converters"), os.display_name());
    for d in tools.descriptors() {
        match d.invocation() {
            Some(path) => println!("  {} {:<16} {}", green("✓"), d.tool.as_str(), path.display()),
            None => {
                println!("  {} {:<16} {}", red("✗"), d.tool.family().display_name(), dim("not found"));
                for line in install_hint(d.tool.family(), os).lines() {
                    println!("      {}", dim(line));
                }
            }
        }
    }
    Ok(())
}
