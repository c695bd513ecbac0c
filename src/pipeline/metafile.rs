//! WMF/EMF → PNG conversion through external tools.
//!
//! Neither the `image` crate nor any vision API decodes Windows metafiles,
//! so legacy clip-art has to be rasterised by ImageMagick or LibreOffice.
//! Both are optional; [`converter_probe`] reports which ones exist.
//!
//! ## Attempt order
//!
//! ```text
//! no tool at all ─────────────────────────────▶ NoConverter (install hint)
//! stage a copy with the right suffix (if needed)
//! A  magick wmf:<in> png:<out>                    30 s
//! B  magick -background white … -flatten          30 s   only after a delegate error in A
//! C  soffice --headless --convert-to png          60 s   WMF only
//! all failed ─────────────────────────────────▶ Exhausted (remediation)
//! ```
//!
//! The first attempt that leaves a non-empty file at the output path wins.
//! The staged copy and LibreOffice's scratch directory are RAII temporaries
//! and are gone when [`MetafileConverter::convert_file`] returns, whatever
//! the outcome.

use crate::config::AnnotateConfig;
use crate::error::ConversionError;
use crate::pipeline::sniff::FormatTag;
use converter_probe::{install_hint, OsFamily, ToolFamily, ToolId, ToolSet};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};

/// Substrings (lowercase) that identify an ImageMagick delegate failure.
const DELEGATE_MARKERS: &[&str] = &[
    "delegate",
    "failedtoexecutecommand",
    "libwmf",
];

// ── Process seam ─────────────────────────────────────────────────────────────

/// One external command: program, explicit argument list, time limit.
///
/// Arguments are never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub timeout: Duration,
}

/// What a finished (or abandoned) command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    fn timed_out(after: Duration) -> Self {
        Self {
            stderr: format!("timed out after {}s", after.as_secs()),
            timed_out: true,
            ..Default::default()
        }
    }

    fn spawn_failed(error: std::io::Error) -> Self {
        Self {
            stderr: format!("failed to start: {error}"),
            ..Default::default()
        }
    }

    /// stderr and stdout joined, for diagnostics and marker matching.
    pub fn diagnostic(&self) -> String {
        let mut text = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stdout);
        }
        if text.is_empty() {
            text = match self.status_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated without output".to_string(),
            };
        }
        text
    }
}

/// Runs external commands. The conversion chain is generic over this so
/// tests can script tool behaviour.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &CommandSpec) -> impl Future<Output = CommandOutput> + Send;
}

/// [`CommandRunner`] backed by `tokio::process`, killing the child on timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    fn run(&self, cmd: &CommandSpec) -> impl Future<Output = CommandOutput> + Send {
        let cmd = cmd.clone();
        async move {
            let mut command = tokio::process::Command::new(&cmd.program);
            command
                .args(&cmd.args)
                .stdin(Stdio::null())
                .kill_on_drop(true);

            match tokio::time::timeout(cmd.timeout, command.output()).await {
                Err(_) => CommandOutput::timed_out(cmd.timeout),
                Ok(Err(e)) => CommandOutput::spawn_failed(e),
                Ok(Ok(output)) => CommandOutput {
                    success: output.status.success(),
                    status_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                },
            }
        }
    }
}

// ── Attempts ─────────────────────────────────────────────────────────────────

/// Invocation variant within the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A: explicit `fmt:` prefixes on input and output.
    ExplicitFormat,
    /// B: white background, alpha removed, flattened.
    FlattenedBackground,
    /// C: LibreOffice headless batch conversion.
    OfficeHeadless,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::ExplicitFormat => "explicit-format-flag",
            Strategy::FlattenedBackground => "background-flattened-retry",
            Strategy::OfficeHeadless => "office-headless",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(PathBuf),
    Failure(String),
}

/// One step of the chain and how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionAttempt {
    pub tool: ToolId,
    pub strategy: Strategy,
    pub outcome: AttemptOutcome,
}

impl ConversionAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success(_))
    }

    fn diagnostic(&self) -> &str {
        match &self.outcome {
            AttemptOutcome::Success(_) => "",
            AttemptOutcome::Failure(d) => d,
        }
    }

    fn is_delegate_failure(&self) -> bool {
        let lower = self.diagnostic().to_ascii_lowercase();
        DELEGATE_MARKERS.iter().any(|m| lower.contains(m))
    }
}

// ── Converter ────────────────────────────────────────────────────────────────

/// Drives the ordered WMF/EMF conversion attempts.
pub struct MetafileConverter<R = TokioCommandRunner> {
    tools: ToolSet,
    runner: R,
    os: OsFamily,
    primary_timeout: Duration,
    office_timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl MetafileConverter<TokioCommandRunner> {
    /// Converter over real processes with the default 30 s / 60 s limits.
    pub fn new(tools: ToolSet) -> Self {
        Self::with_runner(tools, TokioCommandRunner)
    }

    /// Converter using the process-wide probed tools and the configured timeouts.
    pub fn from_config(config: &AnnotateConfig) -> Self {
        Self::new(ToolSet::cached()).timeouts(
            Duration::from_secs(config.primary_timeout_secs),
            Duration::from_secs(config.office_timeout_secs),
        )
    }
}

impl<R: CommandRunner> MetafileConverter<R> {
    pub fn with_runner(tools: ToolSet, runner: R) -> Self {
        Self {
            tools,
            runner,
            os: OsFamily::current(),
            primary_timeout: Duration::from_secs(30),
            office_timeout: Duration::from_secs(60),
            scratch_root: None,
        }
    }

    /// OS family used for install hints.
    pub fn os(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    pub fn timeouts(mut self, primary: Duration, office: Duration) -> Self {
        self.primary_timeout = primary;
        self.office_timeout = office;
        self
    }

    /// Create staged copies and scratch directories under `dir` instead of
    /// the system temp directory.
    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Convert the metafile at `source` into a PNG at `output`.
    ///
    /// Returns the successful attempt. `format` must be the classification
    /// of `source`'s bytes.
    pub async fn convert_file(
        &self,
        source: &Path,
        format: FormatTag,
        output: &Path,
    ) -> Result<ConversionAttempt, ConversionError> {
        if !format.is_legacy_vector() {
            return Err(ConversionError::UnsupportedFormat(format));
        }
        if !self.tools.has_any() {
            return Err(ConversionError::NoConverter {
                format,
                hint: install_hint(ToolFamily::ImageMagick, self.os),
            });
        }

        // Held until the end of this function; dropping it deletes the copy.
        let staged = self.stage(source, format)?;
        let input = staged.as_ref().map(|t| t.path()).unwrap_or(source);

        let mut attempts: Vec<ConversionAttempt> = Vec::new();

        if let Some(magick) = self.tools.imagemagick.invocation() {
            let tool = self.tools.imagemagick.tool;
            let a = self
                .attempt_imagemagick(tool, magick, Strategy::ExplicitFormat, input, format, output)
                .await;
            if a.succeeded() {
                return Ok(a);
            }
            let delegate_failed = a.is_delegate_failure();
            attempts.push(a);

            if delegate_failed {
                let b = self
                    .attempt_imagemagick(tool, magick, Strategy::FlattenedBackground, input, format, output)
                    .await;
                if b.succeeded() {
                    return Ok(b);
                }
                attempts.push(b);
            }
        }

        if format == FormatTag::Wmf {
            if let Some(soffice) = self.tools.libreoffice.invocation() {
                let c = self.attempt_office(soffice, input, output).await;
                if c.succeeded() {
                    return Ok(c);
                }
                attempts.push(c);
            }
        }

        let remediation = self.remediation(format, &attempts);
        warn!("{} conversion failed after {} attempt(s)", format, attempts.len());
        Err(ConversionError::Exhausted {
            format,
            attempts: attempts.len(),
            libreoffice_installed: self.tools.libreoffice.available,
            remediation,
        })
    }

    /// Convert an in-memory metafile into a PNG at `output`.
    pub async fn convert_bytes(
        &self,
        bytes: &[u8],
        format: FormatTag,
        output: &Path,
    ) -> Result<ConversionAttempt, ConversionError> {
        if !format.is_legacy_vector() {
            return Err(ConversionError::UnsupportedFormat(format));
        }
        let staged = self
            .temp_file(format)
            .and_then(|f| std::fs::write(f.path(), bytes).map(|_| f))
            .map_err(|source| ConversionError::Staging { format, source })?;
        self.convert_file(staged.path(), format, output).await
    }

    /// Copy `source` to a correctly suffixed temp file when its extension
    /// does not name `format`; some delegates dispatch on the suffix.
    fn stage(&self, source: &Path, format: FormatTag) -> Result<Option<NamedTempFile>, ConversionError> {
        let matches = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| format.matches_extension(e));
        if matches {
            return Ok(None);
        }

        let staged = self
            .temp_file(format)
            .and_then(|f| std::fs::copy(source, f.path()).map(|_| f))
            .map_err(|source| ConversionError::Staging { format, source })?;
        debug!("Staged {} as {}", source.display(), staged.path().display());
        Ok(Some(staged))
    }

    fn temp_file(&self, format: FormatTag) -> std::io::Result<NamedTempFile> {
        let suffix = format!(".{}", format.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("alttext-").suffix(&suffix);
        match &self.scratch_root {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("alttext-office-");
        match &self.scratch_root {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }

    async fn attempt_imagemagick(
        &self,
        tool: ToolId,
        program: &Path,
        strategy: Strategy,
        input: &Path,
        format: FormatTag,
        output: &Path,
    ) -> ConversionAttempt {
        let input_arg = prefixed(format.extension(), input);
        let output_arg = prefixed("png", output);
        let args: Vec<OsString> = match strategy {
            Strategy::FlattenedBackground => vec![
                "-background".into(),
                "white".into(),
                input_arg,
                "-alpha".into(),
                "remove".into(),
                "-alpha".into(),
                "off".into(),
                "-flatten".into(),
                output_arg,
            ],
            _ => vec![input_arg, output_arg],
        };
        let cmd = CommandSpec {
            program: program.to_path_buf(),
            args,
            timeout: self.primary_timeout,
        };
        self.run_attempt(tool, strategy, &cmd, output).await
    }

    async fn attempt_office(
        &self,
        program: &Path,
        input: &Path,
        output: &Path,
    ) -> ConversionAttempt {
        let scratch = match self.scratch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                return self.log_attempt(ConversionAttempt {
                    tool: ToolId::LibreOffice,
                    strategy: Strategy::OfficeHeadless,
                    outcome: AttemptOutcome::Failure(format!("could not create scratch directory: {e}")),
                });
            }
        };
        let cmd = CommandSpec {
            program: program.to_path_buf(),
            args: vec![
                "--headless".into(),
                "--convert-to".into(),
                "png".into(),
                "--outdir".into(),
                scratch.path().as_os_str().to_owned(),
                input.as_os_str().to_owned(),
            ],
            timeout: self.office_timeout,
        };

        remove_stale(output);
        debug!("{} ({}): {:?}", ToolId::LibreOffice, Strategy::OfficeHeadless.as_str(), cmd.args);
        let result = self.runner.run(&cmd).await;

        let produced = office_output_path(scratch.path(), input);
        let outcome = if result.success && is_non_empty(&produced) {
            match relocate(&produced, output) {
                Ok(()) => AttemptOutcome::Success(output.to_path_buf()),
                Err(e) => AttemptOutcome::Failure(format!("could not move converted file: {e}")),
            }
        } else if result.success {
            AttemptOutcome::Failure(format!(
                "reported success but produced no {}",
                produced.display()
            ))
        } else {
            AttemptOutcome::Failure(result.diagnostic())
        };

        self.log_attempt(ConversionAttempt {
            tool: ToolId::LibreOffice,
            strategy: Strategy::OfficeHeadless,
            outcome,
        })
    }

    async fn run_attempt(
        &self,
        tool: ToolId,
        strategy: Strategy,
        cmd: &CommandSpec,
        output: &Path,
    ) -> ConversionAttempt {
        remove_stale(output);
        debug!("{} ({}): {:?}", tool, strategy.as_str(), cmd.args);
        let result = self.runner.run(cmd).await;

        let outcome = if result.success && is_non_empty(output) {
            AttemptOutcome::Success(output.to_path_buf())
        } else if result.success {
            AttemptOutcome::Failure("reported success but wrote no output".to_string())
        } else {
            AttemptOutcome::Failure(result.diagnostic())
        };
        self.log_attempt(ConversionAttempt {
            tool,
            strategy,
            outcome,
        })
    }

    fn log_attempt(&self, attempt: ConversionAttempt) -> ConversionAttempt {
        match &attempt.outcome {
            AttemptOutcome::Success(path) => info!(
                "Converted with {} ({}) → {}",
                attempt.tool,
                attempt.strategy.as_str(),
                path.display()
            ),
            AttemptOutcome::Failure(diag) => debug!(
                "{} ({}) failed: {}",
                attempt.tool,
                attempt.strategy.as_str(),
                first_line(diag)
            ),
        }
        attempt
    }

    /// Human-readable explanation of why nothing worked and what to install.
    fn remediation(&self, format: FormatTag, attempts: &[ConversionAttempt]) -> String {
        let mut lines = Vec::new();

        for a in attempts {
            lines.push(format!(
                "  • {} ({}): {}",
                a.tool,
                a.strategy.as_str(),
                first_line(a.diagnostic())
            ));
        }

        if !self.tools.imagemagick.available {
            lines.push(format!(
                "ImageMagick is not installed.\n{}",
                install_hint(ToolFamily::ImageMagick, self.os)
            ));
        } else if attempts.iter().any(ConversionAttempt::is_delegate_failure) {
            lines.push(format!(
                "ImageMagick could not run its {format} delegate. Its {format} support depends on \
                 libwmf; reinstall ImageMagick with {format} support enabled."
            ));
        }

        if format == FormatTag::Wmf && !self.tools.libreoffice.available {
            lines.push(format!(
                "LibreOffice is not installed; it can convert WMF files ImageMagick cannot.\n{}",
                install_hint(ToolFamily::LibreOffice, self.os)
            ));
        } else if format == FormatTag::Emf {
            lines.push("EMF images can only be converted with ImageMagick.".to_string());
        }

        lines.join("\n")
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// `wmf` + `/tmp/a.wmf` → `wmf:/tmp/a.wmf`.
fn prefixed(format: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(format!("{format}:"));
    arg.push(path.as_os_str());
    arg
}

fn is_non_empty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn remove_stale(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove stale {}: {}", path.display(), e);
        }
    }
}

/// LibreOffice replaces only the input's final extension:
/// `slide1_Picture 1.5.wmf` becomes `<outdir>/slide1_Picture 1.5.png`.
fn office_output_path(outdir: &Path, input: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".png");
    outdir.join(name)
}

/// Rename, falling back to copy when `to` is on another file system.
fn relocate(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map(|_| ())
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use converter_probe::ConverterDescriptor;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted behaviour for one command invocation.
    #[derive(Clone)]
    enum Script {
        /// Exit 0 and write a PNG where the tool would.
        Succeed,
        /// Exit 1 with this stderr.
        Fail(&'static str),
        /// Never finish within the limit.
        Timeout,
    }

    #[derive(Clone, Default)]
    struct FakeRunner {
        seen: Arc<Mutex<Vec<CommandSpec>>>,
        script: Arc<Mutex<VecDeque<Script>>>,
        /// Whether every path argument existed when the command ran.
        inputs_existed: Arc<Mutex<Vec<bool>>>,
    }

    impl FakeRunner {
        fn scripted(steps: &[Script]) -> Self {
            Self {
                script: Arc::new(Mutex::new(steps.iter().cloned().collect())),
                ..Default::default()
            }
        }

        fn take_seen(&self) -> Vec<CommandSpec> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    fn strip_format_prefix(arg: &OsString) -> PathBuf {
        let s = arg.to_string_lossy();
        match s.split_once(':') {
            Some((fmt, rest)) if fmt.len() <= 4 && !fmt.contains('/') => PathBuf::from(rest),
            _ => PathBuf::from(s.as_ref()),
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, cmd: &CommandSpec) -> impl Future<Output = CommandOutput> + Send {
            self.seen.lock().unwrap().push(cmd.clone());
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Script::Fail("unscripted"));

            let is_office = cmd.args.first().is_some_and(|a| a == "--headless");
            let input = if is_office {
                PathBuf::from(cmd.args.last().unwrap())
            } else {
                cmd.args
                    .iter()
                    .find(|a| a.to_string_lossy().starts_with("wmf:") || a.to_string_lossy().starts_with("emf:"))
                    .map(strip_format_prefix)
                    .unwrap()
            };
            self.inputs_existed.lock().unwrap().push(input.exists());

            let output = match step {
                Script::Succeed => {
                    let target = if is_office {
                        let mut name = input.file_stem().unwrap().to_os_string();
                        name.push(".png");
                        PathBuf::from(&cmd.args[4]).join(name)
                    } else {
                        strip_format_prefix(cmd.args.last().unwrap())
                    };
                    std::fs::write(target, b"\x89PNG\r\n\x1a\nfake").unwrap();
                    CommandOutput {
                        success: true,
                        status_code: Some(0),
                        ..Default::default()
                    }
                }
                Script::Fail(stderr) => CommandOutput {
                    success: false,
                    status_code: Some(1),
                    stderr: stderr.to_string(),
                    ..Default::default()
                },
                Script::Timeout => CommandOutput::timed_out(cmd.timeout),
            };
            std::future::ready(output)
        }
    }

    fn tools(magick: bool, office: bool) -> ToolSet {
        ToolSet {
            imagemagick: if magick {
                ConverterDescriptor::found(ToolId::ImageMagick7, "/usr/bin/magick")
            } else {
                ConverterDescriptor::missing(ToolId::ImageMagick7)
            },
            libreoffice: if office {
                ConverterDescriptor::found(ToolId::LibreOffice, "/usr/bin/soffice")
            } else {
                ConverterDescriptor::missing(ToolId::LibreOffice)
            },
        }
    }

    struct Fixture {
        _dir: TempDir,
        scratch: PathBuf,
        source: PathBuf,
        output: PathBuf,
    }

    fn fixture(source_name: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();
        let source = dir.path().join(source_name);
        std::fs::write(&source, [0xD7, 0xCD, 0xC6, 0x9A, 0, 0, 0, 0]).unwrap();
        let output = dir.path().join("out.png");
        Fixture {
            scratch,
            source,
            output,
            _dir: dir,
        }
    }

    fn converter(tools: ToolSet, runner: FakeRunner, fx: &Fixture) -> MetafileConverter<FakeRunner> {
        MetafileConverter::with_runner(tools, runner)
            .os(OsFamily::Linux)
            .scratch_root(&fx.scratch)
    }

    fn scratch_is_empty(fx: &Fixture) -> bool {
        std::fs::read_dir(&fx.scratch).unwrap().next().is_none()
    }

    fn strategies(seen: &[CommandSpec]) -> Vec<&'static str> {
        seen.iter()
            .map(|s| {
                if s.args.first().is_some_and(|a| a == "--headless") {
                    "C"
                } else if s.args.first().is_some_and(|a| a == "-background") {
                    "B"
                } else {
                    "A"
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn no_tools_fails_with_imagemagick_install_hint() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::default();
        let conv = converter(tools(false, false), runner.clone(), &fx).os(OsFamily::MacOs);

        let err = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ConversionError::NoConverter { .. }));
        assert!(msg.contains("ImageMagick"), "got: {msg}");
        assert!(msg.contains("brew install imagemagick"), "got: {msg}");
        assert!(runner.take_seen().is_empty(), "nothing may be spawned");
    }

    #[tokio::test]
    async fn attempt_a_success_stops_the_chain() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::scripted(&[Script::Succeed]);
        let conv = converter(tools(true, true), runner.clone(), &fx);

        let attempt = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap();
        assert_eq!(attempt.strategy, Strategy::ExplicitFormat);
        assert_eq!(attempt.tool, ToolId::ImageMagick7);
        assert!(is_non_empty(&fx.output));

        let seen = runner.take_seen();
        assert_eq!(strategies(&seen), vec!["A"]);
        assert_eq!(seen[0].timeout, Duration::from_secs(30));
        assert!(seen[0].args[0].to_string_lossy().starts_with("wmf:"));
        assert!(seen[0].args[1].to_string_lossy().starts_with("png:"));
    }

    #[tokio::test]
    async fn delegate_error_runs_b_before_c() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::scripted(&[
            Script::Fail("convert: delegate library support not built-in (WMF)"),
            Script::Fail("magick: FailedToExecuteCommand `wmf2eps'"),
            Script::Succeed,
        ]);
        let conv = converter(tools(true, true), runner.clone(), &fx);

        let attempt = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap();
        assert_eq!(attempt.strategy, Strategy::OfficeHeadless);
        assert_eq!(strategies(&runner.take_seen()), vec!["A", "B", "C"]);
        assert!(is_non_empty(&fx.output));
        assert!(scratch_is_empty(&fx), "office scratch dir must be removed");
    }

    #[tokio::test]
    async fn flattened_retry_can_succeed() {
        let fx = fixture("image1.emf");
        let runner = FakeRunner::scripted(&[Script::Fail("no decode delegate for this image format `EMF'"), Script::Succeed]);
        let conv = converter(tools(true, false), runner.clone(), &fx);

        let attempt = conv.convert_file(&fx.source, FormatTag::Emf, &fx.output).await.unwrap();
        assert_eq!(attempt.strategy, Strategy::FlattenedBackground);
        let seen = runner.take_seen();
        assert_eq!(strategies(&seen), vec!["A", "B"]);
        let args: Vec<_> = seen[1].args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..2], &["-background", "white"]);
        assert!(args.contains(&"-flatten".to_string()));
    }

    #[tokio::test]
    async fn other_error_skips_b_but_still_tries_c_for_wmf() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::scripted(&[Script::Fail("improper image header"), Script::Succeed]);
        let conv = converter(tools(true, true), runner.clone(), &fx);

        let attempt = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap();
        assert_eq!(attempt.strategy, Strategy::OfficeHeadless);
        let seen = runner.take_seen();
        assert_eq!(strategies(&seen), vec!["A", "C"]);
        assert_eq!(seen[1].timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::scripted(&[Script::Timeout]);
        let conv = converter(tools(true, false), runner.clone(), &fx);

        let err = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap_err();
        match err {
            ConversionError::Exhausted {
                attempts,
                libreoffice_installed,
                ref remediation,
                ..
            } => {
                assert_eq!(attempts, 1);
                assert!(!libreoffice_installed);
                assert!(remediation.contains("timed out"), "got: {remediation}");
                assert!(remediation.contains("apt-get install libreoffice"), "got: {remediation}");
            }
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(strategies(&runner.take_seen()), vec!["A"]);
    }

    #[tokio::test]
    async fn emf_never_goes_to_libreoffice() {
        let fx = fixture("image1.emf");
        let runner = FakeRunner::scripted(&[Script::Fail("corrupt image")]);
        let conv = converter(tools(true, true), runner.clone(), &fx);

        let err = conv.convert_file(&fx.source, FormatTag::Emf, &fx.output).await.unwrap_err();
        assert!(err.to_string().contains("EMF"));
        assert_eq!(strategies(&runner.take_seen()), vec!["A"]);
    }

    #[tokio::test]
    async fn only_libreoffice_installed_converts_wmf() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::scripted(&[Script::Succeed]);
        let conv = converter(tools(false, true), runner.clone(), &fx);

        let attempt = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap();
        assert_eq!(attempt.tool, ToolId::LibreOffice);
        assert_eq!(strategies(&runner.take_seen()), vec!["C"]);
    }

    #[tokio::test]
    async fn office_output_keeps_dots_in_the_shape_name() {
        let fx = fixture("slide1_Picture 1.5.wmf");
        let runner = FakeRunner::scripted(&[Script::Succeed]);
        let conv = converter(tools(false, true), runner.clone(), &fx);

        let attempt = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap();
        assert_eq!(attempt.strategy, Strategy::OfficeHeadless);
        assert!(is_non_empty(&fx.output));
        assert!(scratch_is_empty(&fx));
    }

    #[test]
    fn office_output_path_swaps_only_the_last_extension() {
        assert_eq!(
            office_output_path(Path::new("/tmp/out"), Path::new("/in/slide1_logo.png.wmf")),
            PathBuf::from("/tmp/out/slide1_logo.png.png")
        );
        assert_eq!(
            office_output_path(Path::new("/tmp/out"), Path::new("/in/clip.wmf")),
            PathBuf::from("/tmp/out/clip.png")
        );
    }

    #[tokio::test]
    async fn office_scratch_failure_keeps_earlier_diagnostics() {
        let fx = fixture("image1.wmf");
        let runner = FakeRunner::scripted(&[Script::Fail("improper image header")]);
        let conv = MetafileConverter::with_runner(tools(true, true), runner.clone())
            .os(OsFamily::Linux)
            .scratch_root(fx.scratch.join("missing"));

        let err = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap_err();
        match err {
            ConversionError::Exhausted {
                attempts,
                ref remediation,
                ..
            } => {
                assert_eq!(attempts, 2);
                assert!(remediation.contains("improper image header"), "got: {remediation}");
                assert!(remediation.contains("scratch directory"), "got: {remediation}");
            }
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(strategies(&runner.take_seen()), vec!["A"]);
    }

    #[tokio::test]
    async fn mismatched_extension_is_staged_and_cleaned_up() {
        let fx = fixture("slide1_Picture 1.png");
        let runner = FakeRunner::scripted(&[Script::Fail("improper image header")]);
        let conv = converter(tools(true, true), runner.clone(), &fx);

        let err = conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await;
        assert!(err.is_err());

        let seen = runner.take_seen();
        let staged = strip_format_prefix(&seen[0].args[0]);
        assert!(staged.starts_with(&fx.scratch));
        assert_eq!(staged.extension().unwrap(), "wmf");
        assert!(runner.inputs_existed.lock().unwrap().iter().all(|e| *e), "staged input exists while tools run");
        assert!(!staged.exists());
        assert!(scratch_is_empty(&fx), "staged copy and scratch dir removed");
        assert!(fx.source.exists(), "the caller's file is never removed");
    }

    #[tokio::test]
    async fn matching_extension_is_used_directly() {
        let fx = fixture("clip.WMF");
        let runner = FakeRunner::scripted(&[Script::Succeed]);
        let conv = converter(tools(true, false), runner.clone(), &fx);

        conv.convert_file(&fx.source, FormatTag::Wmf, &fx.output).await.unwrap();
        let seen = runner.take_seen();
        assert_eq!(strip_format_prefix(&seen[0].args[0]), fx.source);
    }

    #[tokio::test]
    async fn convert_bytes_stages_and_cleans_up() {
        let fx = fixture("unused.wmf");
        let runner = FakeRunner::scripted(&[Script::Succeed]);
        let conv = converter(tools(true, false), runner.clone(), &fx);

        conv.convert_bytes(&[0x01, 0x00, 0x09, 0x00], FormatTag::Wmf, &fx.output)
            .await
            .unwrap();
        assert!(is_non_empty(&fx.output));
        assert!(scratch_is_empty(&fx));
    }

    #[tokio::test]
    async fn native_formats_are_rejected() {
        let fx = fixture("image1.png");
        let conv = converter(tools(true, true), FakeRunner::default(), &fx);
        let err = conv.convert_file(&fx.source, FormatTag::Png, &fx.output).await.unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(FormatTag::Png)));
    }

    #[test]
    fn diagnostic_falls_back_to_status() {
        let out = CommandOutput {
            status_code: Some(3),
            ..Default::default()
        };
        assert_eq!(out.diagnostic(), "exited with status 3");
    }

    #[tokio::test]
    async fn tokio_runner_reports_spawn_failure() {
        let cmd = CommandSpec {
            program: PathBuf::from("/nonexistent/alttext-tool"),
            args: vec![],
            timeout: Duration::from_secs(5),
        };
        let out = TokioCommandRunner.run(&cmd).await;
        assert!(!out.success);
        assert!(out.stderr.contains("failed to start"));
    }
}
