//! Configuration types for alt-text annotation.
//!
//! All annotation behaviour is controlled through [`AnnotateConfig`], built
//! via its [`AnnotateConfigBuilder`]. One struct for every knob makes it easy
//! to share a config across documents in a batch and to log exactly what a
//! run used.

use crate::error::AltTextError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for annotating a presentation.
///
/// Built via [`AnnotateConfig::builder()`] or using
/// [`AnnotateConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_alttext::AnnotateConfig;
///
/// let config = AnnotateConfig::builder()
///     .images_dir("/tmp/alttext-images")
///     .model("gpt-4.1-mini")
///     .max_tokens(400)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnnotateConfig {
    /// Directory receiving one debug copy per extracted image. Default: `images`.
    ///
    /// Relative paths resolve against the process working directory. Hosts
    /// that annotate several documents at once should give each invocation
    /// its own directory: debug-copy names are only unique within a deck.
    pub images_dir: PathBuf,

    /// Prefix of the saved document's file name. Default: `updated_`.
    ///
    /// The output is written beside the input, e.g. `talk.pptx` becomes
    /// `updated_talk.pptx`.
    pub output_prefix: String,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Custom description prompt. If None, uses
    /// [`crate::prompts::DEFAULT_DESCRIPTION_PROMPT`].
    pub prompt: Option<String>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens generated per image. Default: 512.
    ///
    /// Long enough for a paragraph that covers a chart or a code screenshot;
    /// the prompt asks the model not to stop mid-sentence.
    pub max_tokens: usize,

    /// Retry attempts on a failed vision call. Default: 2, at most 10.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled on each retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per vision call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Longest image edge, in pixels, sent to the model. Default: 1024.
    ///
    /// Slide pictures are often exported at print resolution; downscaling
    /// keeps requests small without losing what a description needs.
    pub max_image_dimension: u32,

    /// Timeout for each ImageMagick invocation, in seconds. Default: 30.
    pub primary_timeout_secs: u64,

    /// Timeout for the LibreOffice headless conversion, in seconds. Default: 60.
    pub office_timeout_secs: u64,

    /// Optional per-slide progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            output_prefix: "updated_".to_string(),
            model: None,
            provider_name: None,
            provider: None,
            prompt: None,
            temperature: 0.2,
            max_tokens: 512,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            max_image_dimension: 1024,
            primary_timeout_secs: 30,
            office_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnnotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotateConfig")
            .field("images_dir", &self.images_dir)
            .field("output_prefix", &self.output_prefix)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("primary_timeout_secs", &self.primary_timeout_secs)
            .field("office_timeout_secs", &self.office_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnnotationProgressCallback>"),
            )
            .finish()
    }
}

impl AnnotateConfig {
    /// Create a new builder for `AnnotateConfig`.
    pub fn builder() -> AnnotateConfigBuilder {
        AnnotateConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnnotateConfig`].
#[derive(Debug)]
pub struct AnnotateConfigBuilder {
    config: AnnotateConfig,
}

impl AnnotateConfigBuilder {
    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(64);
        self
    }

    pub fn primary_timeout_secs(mut self, secs: u64) -> Self {
        self.config.primary_timeout_secs = secs.max(1);
        self
    }

    pub fn office_timeout_secs(mut self, secs: u64) -> Self {
        self.config.office_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnnotateConfig, AltTextError> {
        let c = &self.config;
        if c.output_prefix.is_empty() {
            return Err(AltTextError::InvalidConfig(
                "Output prefix must not be empty (the input would be overwritten)".into(),
            ));
        }
        if c.output_prefix.contains(['/', '\\']) {
            return Err(AltTextError::InvalidConfig(format!(
                "Output prefix must be a file-name prefix, got '{}'",
                c.output_prefix
            )));
        }
        if c.max_tokens == 0 {
            return Err(AltTextError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.images_dir.as_os_str().is_empty() {
            return Err(AltTextError::InvalidConfig(
                "Images directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
