//! External collaborators consumed by the pipeline.
//!
//! The pipeline never talks to a model or a speech service directly. It is
//! handed a [`Collaborators`] bundle of trait objects at construction time, so
//! tests substitute deterministic stubs and callers decide the lifecycle of
//! every client.
//!
//! | Trait | Used by | Failure handling |
//! |-------|---------|------------------|
//! | [`Summarizer`] | enrichment | soft: empty summary |
//! | [`ImageDescriber`] | enrichment | soft: empty description |
//! | [`OcrEngine`] | extraction | soft: empty text |
//! | [`SpeechSynthesizer`] | audio assembly | fatal to the audio stage |
//!
//! Ready-made adapters: [`llm::LlmCollaborator`] (summaries, descriptions and
//! OCR through an `edgequake-llm` provider) and [`tts::GoogleTtsClient`].

pub mod llm;
pub mod tts;

use crate::config::{NarrationConfig, VoiceParams};
use crate::document::ImageRef;
use crate::error::{CollaboratorError, NarratorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Produces a short summary of a passage.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// `text` is already bounded to the configured prefix length.
    async fn summarize(&self, text: &str) -> Result<String, CollaboratorError>;
}

/// Produces a one-sentence description of an image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// `context` informs the description but must not be mentioned in it.
    async fn describe(&self, image: &ImageRef, context: &str) -> Result<String, CollaboratorError>;
}

/// Reads text off a rendered page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, page_image: &ImageRef) -> Result<String, CollaboratorError>;
}

/// One speech-synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceParams,
}

/// Turns text into encoded audio (16-bit PCM WAV).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, CollaboratorError>;
}

/// The full set of collaborators one [`crate::narrate::Narrator`] works with.
#[derive(Clone)]
pub struct Collaborators {
    pub summarizer: Arc<dyn Summarizer>,
    pub describer: Arc<dyn ImageDescriber>,
    pub ocr: Arc<dyn OcrEngine>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Collaborators {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        describer: Arc<dyn ImageDescriber>,
        ocr: Arc<dyn OcrEngine>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            summarizer,
            describer,
            ocr,
            synthesizer,
        }
    }

    /// Build the default stack: one LLM adapter serving summaries,
    /// descriptions and OCR, plus Google Cloud Text-to-Speech.
    ///
    /// Credentials come from the environment; see
    /// [`llm::LlmCollaborator::from_config`] and
    /// [`tts::GoogleTtsClient::from_env`].
    pub fn from_config(config: &NarrationConfig) -> Result<Self, NarratorError> {
        let llm = Arc::new(llm::LlmCollaborator::from_config(config)?);
        let tts = Arc::new(tts::GoogleTtsClient::from_env(config.api_timeout_secs)?);
        Ok(Self::new(llm.clone(), llm.clone(), llm, tts))
    }

    /// Like [`Collaborators::from_config`] but without speech credentials.
    ///
    /// Enough for [`crate::narrate::Narrator::prepare_text`]; any narration
    /// attempt fails on its first segment.
    pub fn text_only(config: &NarrationConfig) -> Result<Self, NarratorError> {
        let llm = Arc::new(llm::LlmCollaborator::from_config(config)?);
        Ok(Self::new(llm.clone(), llm.clone(), llm, Arc::new(NoSpeech)))
    }
}

/// Synthesiser standing in when no speech service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpeech;

#[async_trait]
impl SpeechSynthesizer for NoSpeech {
    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>, CollaboratorError> {
        Err(CollaboratorError::RequestFailed {
            collaborator: "speech synthesizer",
            retries: 0,
            detail: "no speech service configured".to_string(),
        })
    }
}
