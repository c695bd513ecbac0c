//! # converter-probe
//!
//! Discover the optional external tools used to turn legacy Windows
//! metafiles (WMF/EMF) into PNG, so callers can decide at runtime which
//! conversion strategies are viable.
//!
//! ## How it works
//!
//! On each call to [`ToolSet::probe`] (or once per process via
//! [`ToolSet::cached`]):
//!
//! 1. Honours explicit overrides (`ALTTEXT_MAGICK_PATH`, `ALTTEXT_SOFFICE_PATH`).
//! 2. Looks for ImageMagick 7's single `magick` binary on `PATH`.
//! 3. Falls back to ImageMagick 6's `convert`, accepted only when
//!    `convert -version` identifies itself as ImageMagick. Windows ships an
//!    unrelated `convert.exe` (FAT → NTFS), so the name alone proves nothing.
//! 4. Looks for LibreOffice's `soffice` / `libreoffice` on `PATH`, then the
//!    application-bundle locations on macOS.
//!
//! Absence is never an error: every probe returns a [`ConverterDescriptor`]
//! whose `available` flag tells the caller what it can use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use converter_probe::{OsFamily, ToolFamily, ToolSet};
//!
//! let tools = ToolSet::probe();
//! if !tools.has_any() {
//!     eprintln!("{}", converter_probe::install_hint(ToolFamily::ImageMagick, OsFamily::current()));
//! }
//! ```
//!
//! ## Platform support
//!
//! | OS      | ImageMagick          | LibreOffice                                   |
//! |---------|----------------------|-----------------------------------------------|
//! | macOS   | `magick`, `convert`  | `PATH`, `/Applications/LibreOffice.app`, `~/Applications/LibreOffice.app` |
//! | Linux   | `magick`, `convert`  | `PATH`                                        |
//! | Windows | `magick.exe`         | `PATH`                                        |

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

// ── Public constants ─────────────────────────────────────────────────────────

/// Override for the ImageMagick binary. Skips `PATH` probing when it exists.
pub const MAGICK_PATH_ENV: &str = "ALTTEXT_MAGICK_PATH";

/// Override for the LibreOffice `soffice` binary.
pub const SOFFICE_PATH_ENV: &str = "ALTTEXT_SOFFICE_PATH";

/// Well-known LibreOffice bundle locations on macOS, relative to `/` or `~`.
const MACOS_SOFFICE_BUNDLE: &str = "Applications/LibreOffice.app/Contents/MacOS/soffice";

// ── Identity types ───────────────────────────────────────────────────────────

/// One concrete external converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    /// ImageMagick 7, invoked as `magick`.
    ImageMagick7,
    /// ImageMagick 6, invoked as `convert`.
    ImageMagick6,
    /// LibreOffice in headless mode, invoked as `soffice`.
    LibreOffice,
}

impl ToolId {
    /// Stable identity string used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::ImageMagick7 => "imagemagick-v7",
            ToolId::ImageMagick6 => "imagemagick-v6",
            ToolId::LibreOffice => "libreoffice",
        }
    }

    /// The family this tool belongs to.
    pub fn family(self) -> ToolFamily {
        match self {
            ToolId::ImageMagick7 | ToolId::ImageMagick6 => ToolFamily::ImageMagick,
            ToolId::LibreOffice => ToolFamily::LibreOffice,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool family, the unit install instructions are given for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFamily {
    ImageMagick,
    LibreOffice,
}

impl ToolFamily {
    /// Human-facing product name.
    pub fn display_name(self) -> &'static str {
        match self {
            ToolFamily::ImageMagick => "ImageMagick",
            ToolFamily::LibreOffice => "LibreOffice",
        }
    }
}

/// Operating-system family, used to pick install instructions and probe
/// locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    MacOs,
    Linux,
    Windows,
    Other,
}

impl OsFamily {
    /// The family of the running host.
    pub fn current() -> Self {
        Self::from_os_str(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value to a family.
    pub fn from_os_str(os: &str) -> Self {
        match os {
            "macos" => OsFamily::MacOs,
            "linux" => OsFamily::Linux,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }

    /// Human-facing name.
    pub fn display_name(self) -> &'static str {
        match self {
            OsFamily::MacOs => "macOS",
            OsFamily::Linux => "Linux",
            OsFamily::Windows => "Windows",
            OsFamily::Other => "this platform",
        }
    }
}

// ── Descriptors ──────────────────────────────────────────────────────────────

/// Availability report for one external tool.
///
/// `path` is `Some` if and only if `available` is `true`; construct through
/// [`ConverterDescriptor::found`] / [`ConverterDescriptor::missing`] to keep
/// that invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterDescriptor {
    pub tool: ToolId,
    pub available: bool,
    pub path: Option<PathBuf>,
}

impl ConverterDescriptor {
    pub fn found(tool: ToolId, path: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            available: true,
            path: Some(path.into()),
        }
    }

    pub fn missing(tool: ToolId) -> Self {
        Self {
            tool,
            available: false,
            path: None,
        }
    }

    /// The invocation path, when available.
    pub fn invocation(&self) -> Option<&Path> {
        if self.available {
            self.path.as_deref()
        } else {
            None
        }
    }
}

/// The converters located in the current environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSet {
    /// ImageMagick, v7 preferred over v6.
    pub imagemagick: ConverterDescriptor,
    /// LibreOffice headless.
    pub libreoffice: ConverterDescriptor,
}

static CACHED: OnceLock<ToolSet> = OnceLock::new();

impl ToolSet {
    /// Probe the environment now.
    pub fn probe() -> Self {
        Prober::from_env().probe()
    }

    /// Probe once per process and reuse the result.
    ///
    /// The environment is not expected to change mid-run, so repeated
    /// conversions in one process can share the result.
    pub fn cached() -> Self {
        CACHED.get_or_init(Self::probe).clone()
    }

    /// A set with nothing installed.
    pub fn none() -> Self {
        Self {
            imagemagick: ConverterDescriptor::missing(ToolId::ImageMagick7),
            libreoffice: ConverterDescriptor::missing(ToolId::LibreOffice),
        }
    }

    /// `true` when at least one converter was located.
    pub fn has_any(&self) -> bool {
        self.imagemagick.available || self.libreoffice.available
    }

    /// Descriptors in probe order, for reporting.
    pub fn descriptors(&self) -> [&ConverterDescriptor; 2] {
        [&self.imagemagick, &self.libreoffice]
    }
}

// ── Prober ───────────────────────────────────────────────────────────────────

/// Probe configuration: the search path, overrides and host family.
///
/// [`ToolSet::probe`] uses [`Prober::from_env`]; tests build their own to
/// point at a scratch directory.
#[derive(Debug, Clone)]
pub struct Prober {
    search_path: Option<OsString>,
    magick_override: Option<PathBuf>,
    soffice_override: Option<PathBuf>,
    os: OsFamily,
    home: Option<PathBuf>,
}

impl Prober {
    /// Read `PATH`, the override variables, the host family and home dir.
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
            magick_override: std::env::var_os(MAGICK_PATH_ENV).map(PathBuf::from),
            soffice_override: std::env::var_os(SOFFICE_PATH_ENV).map(PathBuf::from),
            os: OsFamily::current(),
            home: dirs::home_dir(),
        }
    }

    /// A prober that searches only `search_path` and uses no overrides.
    pub fn with_search_path(search_path: impl Into<OsString>, os: OsFamily) -> Self {
        Self {
            search_path: Some(search_path.into()),
            magick_override: None,
            soffice_override: None,
            os,
            home: None,
        }
    }

    pub fn home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn magick_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.magick_override = Some(path.into());
        self
    }

    pub fn soffice_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.soffice_override = Some(path.into());
        self
    }

    /// Locate both tool families.
    pub fn probe(&self) -> ToolSet {
        ToolSet {
            imagemagick: self.locate_imagemagick(),
            libreoffice: self.locate_libreoffice(),
        }
    }

    /// Prefer `magick` (v7); accept `convert` (v6) only if it really is
    /// ImageMagick.
    pub fn locate_imagemagick(&self) -> ConverterDescriptor {
        if let Some(path) = self.magick_override.as_ref().filter(|p| p.is_file()) {
            let tool = if file_stem_is(path, "magick") {
                ToolId::ImageMagick7
            } else {
                ToolId::ImageMagick6
            };
            return ConverterDescriptor::found(tool, path);
        }

        if let Some(path) = self.find_on_path("magick") {
            return ConverterDescriptor::found(ToolId::ImageMagick7, path);
        }

        if let Some(path) = self.find_on_path("convert") {
            if reports_imagemagick(&path) {
                return ConverterDescriptor::found(ToolId::ImageMagick6, path);
            }
        }

        ConverterDescriptor::missing(ToolId::ImageMagick7)
    }

    /// `soffice`/`libreoffice` on `PATH`, then the macOS application bundle.
    pub fn locate_libreoffice(&self) -> ConverterDescriptor {
        if let Some(path) = self.soffice_override.as_ref().filter(|p| p.is_file()) {
            return ConverterDescriptor::found(ToolId::LibreOffice, path);
        }

        for name in ["soffice", "libreoffice"] {
            if let Some(path) = self.find_on_path(name) {
                return ConverterDescriptor::found(ToolId::LibreOffice, path);
            }
        }

        if self.os == OsFamily::MacOs {
            let mut candidates = vec![Path::new("/").join(MACOS_SOFFICE_BUNDLE)];
            if let Some(home) = &self.home {
                candidates.push(home.join(MACOS_SOFFICE_BUNDLE));
            }
            if let Some(path) = candidates.into_iter().find(|p| p.is_file()) {
                return ConverterDescriptor::found(ToolId::LibreOffice, path);
            }
        }

        ConverterDescriptor::missing(ToolId::LibreOffice)
    }

    /// Search the configured `PATH` for an executable named `name`.
    pub fn find_on_path(&self, name: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .flat_map(|dir| executable_candidates(&dir, name, self.os))
            .find(|candidate| is_executable(candidate))
    }
}

// ── Install hints ────────────────────────────────────────────────────────────

/// Installation instructions for `family` on `os`.
pub fn install_hint(family: ToolFamily, os: OsFamily) -> String {
    match (family, os) {
        (ToolFamily::ImageMagick, OsFamily::MacOs) => {
            "Install ImageMagick with Homebrew:\n  brew install imagemagick".to_string()
        }
        (ToolFamily::ImageMagick, OsFamily::Linux) => "Install ImageMagick with your package manager:\n  \
             sudo apt-get install imagemagick   (Debian/Ubuntu)\n  \
             sudo dnf install ImageMagick       (Fedora/RHEL)"
            .to_string(),
        (ToolFamily::ImageMagick, OsFamily::Windows) => "Install ImageMagick:\n  \
             winget install ImageMagick.ImageMagick\n  \
             or: choco install imagemagick\n\
             Make sure `magick.exe` is on PATH."
            .to_string(),
        (ToolFamily::ImageMagick, OsFamily::Other) => {
            "Install ImageMagick from https://imagemagick.org/script/download.php \
             and make sure `magick` is on PATH."
                .to_string()
        }
        (ToolFamily::LibreOffice, OsFamily::MacOs) => {
            "Install LibreOffice with Homebrew:\n  brew install --cask libreoffice".to_string()
        }
        (ToolFamily::LibreOffice, OsFamily::Linux) => "Install LibreOffice with your package manager:\n  \
             sudo apt-get install libreoffice   (Debian/Ubuntu)\n  \
             sudo dnf install libreoffice       (Fedora/RHEL)"
            .to_string(),
        (ToolFamily::LibreOffice, OsFamily::Windows) => "Install LibreOffice:\n  \
             winget install TheDocumentFoundation.LibreOffice\n\
             Make sure `soffice.exe` is on PATH."
            .to_string(),
        (ToolFamily::LibreOffice, OsFamily::Other) => {
            "Install LibreOffice from https://www.libreoffice.org/download/ \
             and make sure `soffice` is on PATH."
                .to_string()
        }
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn executable_candidates(dir: &Path, name: &str, os: OsFamily) -> Vec<PathBuf> {
    if os == OsFamily::Windows {
        vec![dir.join(format!("{name}.exe")), dir.join(format!("{name}.com"))]
    } else {
        vec![dir.join(name)]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn file_stem_is(path: &Path, stem: &str) -> bool {
    path.file_stem()
        .map(|s| s.eq_ignore_ascii_case(OsStr::new(stem)))
        .unwrap_or(false)
}

/// Run `<path> -version` and check the product identity in its output.
fn reports_imagemagick(path: &Path) -> bool {
    match Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            stdout.contains("ImageMagick") || stderr.contains("ImageMagick")
        }
        Err(_) => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
