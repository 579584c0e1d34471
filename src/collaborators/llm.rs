//! Text and vision collaborator backed by an `edgequake-llm` provider.
//!
//! One [`LlmCollaborator`] serves three roles: [`Summarizer`],
//! [`ImageDescriber`] and [`OcrEngine`]. All prompt wording lives in
//! [`crate::prompts`]; this module owns retry, timeout and response
//! validation only.
//!
//! ## Retry Strategy
//!
//! Exponential backoff (`retry_backoff_ms * 2^attempt`). With the defaults
//! (500 ms, 2 retries) a failing call waits 500 ms → 1 s before giving up.
//! An empty answer is not retried: the model understood the request and had
//! nothing to say.

use crate::collaborators::{ImageDescriber, OcrEngine, Summarizer};
use crate::config::NarrationConfig;
use crate::document::ImageRef;
use crate::error::{CollaboratorError, NarratorError};
use crate::pipeline::encode;
use crate::prompts::{
    image_description_prompt, summary_prompt, DESCRIPTION_SYSTEM_PROMPT, OCR_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// LLM-backed summariser, image describer and OCR engine.
pub struct LlmCollaborator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl LlmCollaborator {
    /// Wrap an already-constructed provider, taking call settings from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &NarrationConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &NarrationConfig) -> Result<Self, NarratorError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Send `messages`, retrying transient failures; returns trimmed content.
    async fn complete(
        &self,
        collaborator: &'static str,
        messages: &[ChatMessage],
    ) -> Result<String, CollaboratorError> {
        let start = Instant::now();
        let options = self.options();
        let mut last_err = String::from("Unknown error");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    collaborator, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(messages, Some(&options));
            match timeout(Duration::from_secs(self.timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        collaborator,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let content = response.content.trim().to_string();
                    if content.is_empty() {
                        return Err(CollaboratorError::EmptyResponse { collaborator });
                    }
                    return Ok(content);
                }
                Ok(Err(e)) => {
                    last_err = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", collaborator, attempt + 1, last_err);
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        collaborator,
                        attempt + 1,
                        self.timeout_secs
                    );
                    if attempt == self.max_retries {
                        return Err(CollaboratorError::Timeout {
                            collaborator,
                            secs: self.timeout_secs,
                        });
                    }
                    last_err = format!("timed out after {}s", self.timeout_secs);
                }
            }
        }

        Err(CollaboratorError::RequestFailed {
            collaborator,
            retries: self.max_retries,
            detail: last_err,
        })
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    base.saturating_mul(factor)
}

#[async_trait]
impl Summarizer for LlmCollaborator {
    async fn summarize(&self, text: &str) -> Result<String, CollaboratorError> {
        let prompt = summary_prompt(text);
        let messages = vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user_with_images(prompt.as_str(), vec![]),
        ];
        self.complete("summarizer", &messages).await
    }
}

#[async_trait]
impl ImageDescriber for LlmCollaborator {
    async fn describe(&self, image: &ImageRef, context: &str) -> Result<String, CollaboratorError> {
        let image_data = encode::to_image_data(image)?;
        let prompt = image_description_prompt(context);
        let messages = vec![
            ChatMessage::system(DESCRIPTION_SYSTEM_PROMPT),
            ChatMessage::user_with_images(prompt.as_str(), vec![image_data]),
        ];
        self.complete("image describer", &messages).await
    }
}

#[async_trait]
impl OcrEngine for LlmCollaborator {
    async fn recognize(&self, page_image: &ImageRef) -> Result<String, CollaboratorError> {
        let image_data = encode::to_image_data(page_image)?;
        // Image-only user turn: the page carries all the content.
        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        self.complete("ocr", &messages).await
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, NarratorError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        NarratorError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &NarrationConfig) -> Result<Arc<dyn LLMProvider>, NarratorError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| NarratorError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
