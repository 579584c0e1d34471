//! Configuration types for document narration.
//!
//! All pipeline behaviour is controlled through [`NarrationConfig`], built via
//! its [`NarrationConfigBuilder`]. Voice settings can additionally be
//! overridden per call with [`VoiceParams`].

use crate::error::NarratorError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default hard budget for one narration segment, in characters.
///
/// Google's `text:synthesize` caps the input at 5 000 bytes, not characters.
/// 4 500 characters fits ASCII and most Latin text; scripts that need two or
/// three UTF-8 bytes per character (CJK, Cyrillic, Greek) need a budget of
/// roughly 1 600 to 2 400.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4500;

/// Default silence inserted between two synthesised segments.
pub const DEFAULT_SILENCE_GAP_MS: u32 = 300;

/// Default number of characters of a block sent to the summariser.
pub const DEFAULT_SUMMARY_PREFIX_CHARS: usize = 2000;

/// Configuration for a document narration.
///
/// # Example
/// ```rust
/// use edgequake_doc2audio::{NarrationConfig, VoiceGender};
///
/// let config = NarrationConfig::builder()
///     .max_chunk_chars(3000)
///     .voice_gender(VoiceGender::Female)
///     .language_code("en-GB")
///     .build()
///     .unwrap();
/// assert_eq!(config.voice.language_code, "en-GB");
/// ```
#[derive(Clone)]
pub struct NarrationConfig {
    /// Hard character budget for one narration segment. Default: 4500.
    pub max_chunk_chars: usize,

    /// Silence between consecutive segments in the merged audio. Default: 300 ms.
    pub silence_gap_ms: u32,

    /// Default voice for synthesis. Default: neutral, `en-US`.
    pub voice: VoiceParams,

    /// Summaries are requested on this many leading characters only. Default: 2000.
    pub summary_prefix_chars: usize,

    /// How Word images are attributed to paragraphs. Default: [`ImageAttribution::Placement`].
    pub image_attribution: ImageAttribution,

    /// What to do with a single sentence longer than `max_chunk_chars`.
    /// Default: [`OversizePolicy::PassThrough`].
    pub oversize_policy: OversizePolicy,

    /// LLM model identifier for summaries, descriptions and OCR.
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for generated text. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per generated summary/description/transcription. Default: 1024.
    pub max_tokens: usize,

    /// Retry attempts per text/vision call. Default: 2.
    ///
    /// Speech synthesis is never retried by the library.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-collaborator-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Longest edge, in pixels, of page images rendered for OCR. Default: 2000.
    pub ocr_render_pixels: u32,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            silence_gap_ms: DEFAULT_SILENCE_GAP_MS,
            voice: VoiceParams::default(),
            summary_prefix_chars: DEFAULT_SUMMARY_PREFIX_CHARS,
            image_attribution: ImageAttribution::default(),
            oversize_policy: OversizePolicy::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            password: None,
            ocr_render_pixels: 2000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for NarrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrationConfig")
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("silence_gap_ms", &self.silence_gap_ms)
            .field("voice", &self.voice)
            .field("summary_prefix_chars", &self.summary_prefix_chars)
            .field("image_attribution", &self.image_attribution)
            .field("oversize_policy", &self.oversize_policy)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_render_pixels", &self.ocr_render_pixels)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn NarrationProgressCallback>"),
            )
            .finish()
    }
}

impl NarrationConfig {
    /// Create a new builder for `NarrationConfig`.
    pub fn builder() -> NarrationConfigBuilder {
        NarrationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NarrationConfig`].
#[derive(Debug)]
pub struct NarrationConfigBuilder {
    config: NarrationConfig,
}

impl NarrationConfigBuilder {
    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn silence_gap_ms(mut self, ms: u32) -> Self {
        self.config.silence_gap_ms = ms;
        self
    }

    pub fn voice(mut self, voice: VoiceParams) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn voice_gender(mut self, gender: VoiceGender) -> Self {
        self.config.voice.gender = gender;
        self
    }

    pub fn language_code(mut self, code: impl Into<String>) -> Self {
        self.config.voice.language_code = code.into();
        self
    }

    pub fn summary_prefix_chars(mut self, n: usize) -> Self {
        self.config.summary_prefix_chars = n;
        self
    }

    pub fn image_attribution(mut self, policy: ImageAttribution) -> Self {
        self.config.image_attribution = policy;
        self
    }

    pub fn oversize_policy(mut self, policy: OversizePolicy) -> Self {
        self.config.oversize_policy = policy;
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

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_render_pixels(mut self, px: u32) -> Self {
        self.config.ocr_render_pixels = px.max(100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NarrationConfig, NarratorError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(NarratorError::InvalidConfig(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.summary_prefix_chars == 0 {
            return Err(NarratorError::InvalidConfig(
                "summary_prefix_chars must be ≥ 1".into(),
            ));
        }
        c.voice.validate()?;
        if c.api_timeout_secs == 0 {
            return Err(NarratorError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Voice gender requested from the speech-synthesis collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceGender {
    Male,
    Female,
    #[default]
    Neutral,
}

impl VoiceGender {
    /// Wire name (`MALE`, `FEMALE`, `NEUTRAL`).
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Male => "MALE",
            VoiceGender::Female => "FEMALE",
            VoiceGender::Neutral => "NEUTRAL",
        }
    }

    /// Lenient parse; anything unrecognised is `Neutral`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => VoiceGender::Male,
            "FEMALE" => VoiceGender::Female,
            _ => VoiceGender::Neutral,
        }
    }
}

/// Voice parameters for one narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub gender: VoiceGender,
    /// BCP-47 language code, e.g. `en-US`, `fr-FR`.
    pub language_code: String,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            gender: VoiceGender::Neutral,
            language_code: "en-US".to_string(),
        }
    }
}

impl VoiceParams {
    pub fn new(gender: VoiceGender, language_code: impl Into<String>) -> Self {
        Self {
            gender,
            language_code: language_code.into(),
        }
    }

    /// Shallow BCP-47 shape check: alphanumeric subtags joined by `-`, the
    /// first one 2–3 letters.
    pub fn validate(&self) -> Result<(), NarratorError> {
        let mut subtags = self.language_code.split('-');
        let primary = subtags.next().unwrap_or("");
        let primary_ok = (2..=3).contains(&primary.len())
            && primary.chars().all(|c| c.is_ascii_alphabetic());
        let rest_ok = subtags.all(|t| {
            !t.is_empty() && t.len() <= 8 && t.chars().all(|c| c.is_ascii_alphanumeric())
        });
        if primary_ok && rest_ok {
            Ok(())
        } else {
            Err(NarratorError::InvalidConfig(format!(
                "'{}' is not a BCP-47 language code",
                self.language_code
            )))
        }
    }
}

/// How images embedded in a Word document are attributed to paragraphs.
///
/// | Policy | Behaviour |
/// |--------|-----------|
/// | `Placement` | resolve each drawing's relationship id to its own media part; fall back to the shared pool only when a drawing carries no resolvable id |
/// | `SharedPool` | every paragraph flagged as containing a drawing receives **all** media parts; the first one is described |
///
/// `SharedPool` is a best-effort heuristic: in a document with several
/// images, every flagged paragraph ends up described with the first image in
/// the archive. It is kept for parity with documents whose relationship
/// parts are missing or broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageAttribution {
    #[default]
    Placement,
    SharedPool,
}

/// Handling of a single sentence longer than the segment budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OversizePolicy {
    /// Send the sentence whole and flag the segment as oversized. (default)
    #[default]
    PassThrough,
    /// Cut the sentence to the budget on a character boundary (still flagged).
    Truncate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = NarrationConfig::default();
        assert_eq!(c.max_chunk_chars, 4500);
        assert_eq!(c.silence_gap_ms, 300);
        assert_eq!(c.summary_prefix_chars, 2000);
        assert_eq!(c.voice.gender, VoiceGender::Neutral);
        assert_eq!(c.voice.language_code, "en-US");
        assert_eq!(c.image_attribution, ImageAttribution::Placement);
        assert_eq!(c.oversize_policy, OversizePolicy::PassThrough);
    }

    #[test]
    fn builder_rejects_zero_budget() {
        let err = NarrationConfig::builder().max_chunk_chars(0).build();
        assert!(matches!(err, Err(NarratorError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_bad_language() {
        assert!(NarrationConfig::builder().language_code("english").build().is_err());
        assert!(NarrationConfig::builder().language_code("en-").build().is_err());
        assert!(NarrationConfig::builder().language_code("fr-FR").build().is_ok());
        assert!(NarrationConfig::builder().language_code("yue-Hant-HK").build().is_ok());
    }

    #[test]
    fn gender_parsing_is_lenient() {
        assert_eq!(VoiceGender::parse_lenient("female"), VoiceGender::Female);
        assert_eq!(VoiceGender::parse_lenient(" MALE "), VoiceGender::Male);
        assert_eq!(VoiceGender::parse_lenient("robot"), VoiceGender::Neutral);
        assert_eq!(VoiceGender::Female.as_str(), "FEMALE");
    }

    #[test]
    fn gender_serialises_as_wire_name() {
        let json = serde_json::to_string(&VoiceGender::Male).unwrap();
        assert_eq!(json, "\"MALE\"");
    }

    #[test]
    fn debug_hides_provider() {
        let c = NarrationConfig::default();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("max_chunk_chars: 4500"));
    }
}
