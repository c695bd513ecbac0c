//! Input validation: make sure a user-supplied path is a readable `.pptx`.
//!
//! A `.pptx` is a ZIP package, so the first four bytes must be the local
//! file header signature `PK\x03\x04`. Checking that up front turns "you
//! passed a `.ppt`/PDF/empty file" into a clear error instead of a ZIP
//! parser message.

use crate::error::AltTextError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// ZIP local file header signature.
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Validate that `path` exists, is readable and starts with the ZIP magic.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<PathBuf, AltTextError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(AltTextError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if magic == ZIP_MAGIC => {}
                Ok(()) => return Err(AltTextError::NotAPresentation { path, magic }),
                // Shorter than four bytes: report what we have, zero-padded.
                Err(_) => return Err(AltTextError::NotAPresentation { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AltTextError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AltTextError::FileNotFound { path });
        }
    }

    debug!("Resolved local presentation: {}", path.display());
    Ok(path)
}

/// `dir/talk.pptx` + `updated_` → `dir/updated_talk.pptx`.
pub fn output_path_for(input: &Path, prefix: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation.pptx".to_string());
    input.with_file_name(format!("{prefix}{name}"))
}
