//! The external vision service boundary.
//!
//! [`VisionService`] is the crate's only seam to the outside world: one
//! method, one page image in, one raw reply body out. The production
//! implementation ([`LlmVision`]) drives a vision LLM through
//! `edgequake-llm`; test suites inject stubs through
//! [`crate::config::ExtractionConfig::service`].
//!
//! The trait deliberately returns the *raw* reply string rather than a
//! parsed structure: parsing and validation belong to
//! [`crate::pipeline::parse`], where the never-raise contract lives, and
//! stubs get to exercise that code path with arbitrary bodies.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, EXTRACTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// An external service that turns one page image into a product list
/// reply.
///
/// Implementations receive the page as a base64-encoded PNG/JPEG payload
/// and return the raw reply body. Errors returned here are absorbed by the
/// extraction client and degrade the page to zero products; they never
/// propagate past it.
pub trait VisionService: Send + Sync {
    /// Issue exactly one extraction request for one page image.
    fn extract<'a>(&'a self, page_b64: &'a str) -> BoxFuture<'a, Result<String, ExtractError>>;
}

/// Production [`VisionService`] backed by an `edgequake-llm` provider.
pub struct LlmVision {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl LlmVision {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

impl VisionService for LlmVision {
    /// ## Message Layout
    ///
    /// 1. **System message** — the segmentation persona (or caller
    ///    override)
    /// 2. **User message** — the fixed JSON-contract instruction plus the
    ///    page image as a base64 attachment
    ///
    /// Temperature is pinned low and a per-call timeout bounds the
    /// request; there is no retry — page-level isolation in the fan-out
    /// layer is the failure boundary.
    fn extract<'a>(&'a self, page_b64: &'a str) -> BoxFuture<'a, Result<String, ExtractError>> {
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(self.system_prompt.as_str()),
                ChatMessage::user_with_images(
                    EXTRACTION_PROMPT,
                    vec![ImageData::new(page_b64.to_string(), "image/png").with_detail("high")],
                ),
            ];

            let options = CompletionOptions {
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            };

            let response = timeout(
                Duration::from_secs(self.timeout_secs),
                self.provider.chat(&messages, Some(&options)),
            )
            .await
            .map_err(|_| ExtractError::ServiceTimeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| ExtractError::ServiceCallFailed {
                detail: format!("{e}"),
            })?;

            debug!(
                "Vision reply: {} input tokens, {} output tokens, {} bytes",
                response.prompt_tokens,
                response.completion_tokens,
                response.content.len()
            );

            Ok(response.content)
        })
    }
}

/// Resolve the vision service, from most-specific to least-specific.
///
/// The fallback chain lets library users and CLI users each set exactly as
/// much or as little as they need:
///
/// 1. **Custom service** (`config.service`) — used as-is; this is how
///    tests stub the external service.
/// 2. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured the LLM provider entirely.
/// 3. **Named provider + model** (`config.provider_name`) — reads the
///    corresponding API key (`OPENAI_API_KEY`, etc.) from the environment.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
///    — a provider/model choice made at the execution-environment level.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`) — scans known
///    API key variables and picks the first available provider, preferring
///    OpenAI when its key is present.
pub fn resolve_service(config: &ExtractionConfig) -> Result<Arc<dyn VisionService>, ExtractError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(LlmVision::new(Arc::clone(provider), config)));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1");
        let provider = create_vision_provider(name, model)?;
        return Ok(Arc::new(LlmVision::new(provider, config)));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_vision_provider(&prov, &model)?;
            return Ok(Arc::new(LlmVision::new(provider, config)));
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so users
    // with multiple provider keys get a stable default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1");
            let provider = create_vision_provider("openai", model)?;
            return Ok(Arc::new(LlmVision::new(provider, config)));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(Arc::new(LlmVision::new(provider, config)))
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
