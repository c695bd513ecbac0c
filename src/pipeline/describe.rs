//! The description capability: image file in, alt text out.
//!
//! A [`Describer`] never fails. An empty string means "no description
//! produced", and the annotation pipeline treats that the same way whatever
//! the cause (API error, undecodable image, failed metafile conversion).
//!
//! ```text
//! annotate ──▶ NormalizingDescriber ──(WMF/EMF)──▶ MetafileConverter ──▶ PNG
//!                     │                                                  │
//!                     └──────────────(native)──────────▶ LlmDescriber ◀──┘
//! ```

use crate::config::AnnotateConfig;
use crate::error::AltTextError;
use crate::pipeline::encode::encode_image;
use crate::pipeline::metafile::{CommandRunner, MetafileConverter, TokioCommandRunner};
use crate::pipeline::postprocess::clean_description;
use crate::pipeline::sniff::classify_file;
use crate::prompts::{DEFAULT_DESCRIPTION_PROMPT, SYSTEM_PROMPT};
use converter_probe::ToolSet;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Produces a description for the image stored at a path.
///
/// Implemented for plain closures, which makes canned test doubles trivial:
///
/// ```rust
/// use edgequake_alttext::Describer;
/// use std::path::Path;
///
/// let canned = |_: &Path| "A red square.".to_string();
/// # fn takes(_: &impl Describer) {}
/// # takes(&canned);
/// ```
pub trait Describer: Send + Sync {
    /// Describe the image at `image_path`. Returns `""` when nothing could
    /// be produced; never panics on bad input.
    fn describe(&self, image_path: &Path) -> impl Future<Output = String> + Send;
}

impl<F> Describer for F
where
    F: Fn(&Path) -> String + Send + Sync,
{
    fn describe(&self, image_path: &Path) -> impl Future<Output = String> + Send {
        std::future::ready(self(image_path))
    }
}

// ── Metafile normalisation ───────────────────────────────────────────────────

/// Wraps a describer so WMF/EMF inputs are rasterised before it sees them.
///
/// When conversion fails the remediation text is logged and `""` is
/// returned; the inner describer is not called.
pub struct NormalizingDescriber<D, R = TokioCommandRunner> {
    inner: D,
    converter: MetafileConverter<R>,
}

impl<D: Describer> NormalizingDescriber<D> {
    pub fn new(inner: D, tools: ToolSet) -> Self {
        Self::with_converter(inner, MetafileConverter::new(tools))
    }
}

impl<D: Describer, R: CommandRunner> NormalizingDescriber<D, R> {
    pub fn with_converter(inner: D, converter: MetafileConverter<R>) -> Self {
        Self { inner, converter }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn converter(&self) -> &MetafileConverter<R> {
        &self.converter
    }
}

impl<D: Describer, R: CommandRunner> Describer for NormalizingDescriber<D, R> {
    fn describe(&self, image_path: &Path) -> impl Future<Output = String> + Send {
        async move {
            let format = match classify_file(image_path) {
                Ok(f) => f,
                Err(e) => {
                    warn!("Cannot read {}: {}", image_path.display(), e);
                    return String::new();
                }
            };
            if !format.is_legacy_vector() {
                return self.inner.describe(image_path).await;
            }

            let scratch = match tempfile::Builder::new().prefix("alttext-raster-").tempdir() {
                Ok(dir) => dir,
                Err(e) => {
                    warn!("Cannot create scratch directory: {}", e);
                    return String::new();
                }
            };
            let mut name = image_path.file_stem().unwrap_or_default().to_os_string();
            name.push(".png");
            let png = scratch.path().join(name);

            match self.converter.convert_file(image_path, format, &png).await {
                Ok(_) => self.inner.describe(&png).await,
                Err(e) => {
                    warn!("{}: {}", image_path.display(), e);
                    String::new()
                }
            }
        }
    }
}

// ── Vision model ─────────────────────────────────────────────────────────────

/// Describes images with an `edgequake-llm` vision provider.
///
/// Each call reads the file, downsizes it, sends prompt + image, retries
/// transient failures with exponential backoff
/// (`retry_backoff_ms * 2^attempt`) and cleans up the reply.
pub struct LlmDescriber {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
    max_image_dimension: u32,
}

impl LlmDescriber {
    /// Describer over an already-resolved provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnnotateConfig) -> Self {
        Self {
            provider,
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            max_image_dimension: config.max_image_dimension,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &AnnotateConfig) -> Result<Self, AltTextError> {
        let provider = resolve_provider(config)?;
        info!(
            "Vision provider resolved (model: {})",
            config.model.as_deref().unwrap_or("provider default")
        );
        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    fn messages(&self, image: ImageData) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(self.prompt.as_str(), vec![image]),
        ]
    }

    /// Describe one image, reporting why when nothing was produced.
    pub async fn try_describe(&self, image_path: &Path) -> Result<String, String> {
        let start = Instant::now();
        let image = self.load(image_path.to_path_buf()).await?;
        let messages = self.messages(image);
        let options = self.options();

        let mut last_err = String::from("no attempt made");
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    image_path.display(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(self.api_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        image_path.display(),
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(clean_description(&response.content));
                }
                Ok(Err(e)) => last_err = e.to_string(),
                Err(_) => last_err = format!("timed out after {}s", self.api_timeout.as_secs()),
            }
            warn!("{}: attempt {} failed: {}", image_path.display(), attempt + 1, last_err);
        }
        Err(last_err)
    }

    /// Read, decode, resize and encode off the async runtime.
    async fn load(&self, path: PathBuf) -> Result<ImageData, String> {
        let max_dim = self.max_image_dimension;
        tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
            encode_image(&bytes, max_dim).map_err(|e| format!("decode {}: {e}", path.display()))
        })
        .await
        .map_err(|e| format!("image task failed: {e}"))?
    }
}

impl Describer for LlmDescriber {
    fn describe(&self, image_path: &Path) -> impl Future<Output = String> + Send {
        async move {
            match self.try_describe(image_path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("No description for {}: {}", image_path.display(), e);
                    String::new()
                }
            }
        }
    }
}

/// The production describer: metafile normalisation in front of a vision
/// model, using the process-wide probed tools.
pub fn describer_from_config(
    config: &AnnotateConfig,
) -> Result<NormalizingDescriber<LlmDescriber>, AltTextError> {
    let llm = LlmDescriber::from_config(config)?;
    let converter = MetafileConverter::from_config(config);
    Ok(NormalizingDescriber::with_converter(llm, converter))
}

// ── Provider resolution ──────────────────────────────────────────────────────

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AltTextError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AltTextError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`, model defaulting
///    to `gpt-4.1-nano`).
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
///    when both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, else whatever
///    [`ProviderFactory::from_env`] detects.
pub fn resolve_provider(config: &AnnotateConfig) -> Result<Arc<dyn LLMProvider>, AltTextError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AltTextError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Delay before retry number `attempt` (1-based): `base`, `2 × base`, …
/// saturating instead of overflowing.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base.saturating_mul(factor))
}
