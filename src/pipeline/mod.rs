//! Pipeline stages for alt-text annotation.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the external pieces (converters, vision model) can be replaced
//! by test doubles.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ scan ──▶ sniff ──▶ metafile ──▶ describe ──▶ postprocess
//! (.pptx)  (shapes)  (magic)   (WMF/EMF)   (encode+VLM)  (cleanup)
//! ```
//!
//! 1. [`input`]    check the user-supplied path is a readable ZIP package
//! 2. [`scan`]     cursor over slides and their picture shapes
//! 3. [`sniff`]    true image format from content, extension as fallback
//! 4. [`metafile`] ordered ImageMagick / LibreOffice conversion attempts
//! 5. [`encode`]   resize and base64-wrap an image for the vision request
//! 6. [`describe`] the description capability and its implementations
//! 7. [`postprocess`] deterministic cleanup of model replies

pub mod describe;
pub mod encode;
pub mod input;
pub mod metafile;
pub mod postprocess;
pub mod scan;
pub mod sniff;
