//! Prompts for vision-model image description.
//!
//! Every prompt lives here so the wording can change without touching
//! retry or error-handling logic, and so tests can inspect it directly.
//!
//! Callers can override the default via [`crate::config::AnnotateConfig::prompt`].

/// Default instruction sent with every image.
///
/// Used when `AnnotateConfig::prompt` is `None`.
pub const DEFAULT_DESCRIPTION_PROMPT: &str = "Please provide a detailed description of this image \
for accessibility purposes. Include visual details, spatial relationships, text if present, and \
context. Focus on elements that would be important for someone who cannot see the image. Do not \
miss any details. If the image contains table and code or text, explain both. Do not leave the \
sentence midway.";

/// System message framing the model's role.
///
/// Keeps replies to the description itself; prefixes like "Alt text:" are
/// still stripped later by [`crate::pipeline::postprocess`].
pub const SYSTEM_PROMPT: &str = "You write alternative text for images in presentation slides. \
Reply with the description only, as plain prose. Do not add a title, a label such as \"Alt text:\", \
quotation marks or Markdown formatting.";
