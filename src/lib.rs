//! # edgequake-doc2audio
//!
//! Turn PDF and Word documents into a single narrated audio file.
//!
//! ## Why this crate?
//!
//! Screen readers read what is on the page and skip what is not: a figure
//! becomes "image", a scanned page becomes silence. This crate extracts the
//! text, describes every image in one sentence informed by the surrounding
//! text, reads scanned pages through OCR, and narrates the cleaned result
//! with a speech-synthesis service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Input     validate the path, route by extension (table lookup)
//!  ├─ 2. Extract   pdfium pages or DOCX paragraphs; OCR for text-less pages
//!  ├─ 3. Enrich    one-line summaries, context-aware image descriptions
//!  ├─ 4. Clean     paragraphs + explicit section boundaries
//!  ├─ 5. Chunk     greedy packing under a character budget (default 4500)
//!  └─ 6. Assemble  per-segment speech synthesis, WAV merge with 300 ms gaps
//! ```
//!
//! Every stage runs to completion before the next starts, and every
//! collaborator call is awaited before the next is issued.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2audio::{NarrationConfig, Narrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider from OPENAI_API_KEY / GEMINI_API_KEY / …,
//!     // speech from GOOGLE_TTS_API_KEY.
//!     let narrator = Narrator::from_config(NarrationConfig::default())?;
//!     let result = narrator.narrate_file("report.docx").await?;
//!     println!("{}", result.text.cleaned_text);
//!     let artifact = result.audio?;
//!     std::fs::write("report.wav", &artifact.audio)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators
//!
//! Summaries, image descriptions, OCR and speech are external services
//! reached through the traits in [`collaborators`]. Inject your own
//! implementations with [`Narrator::new`] to use another backend or to test
//! without network access.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2audio` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod collaborators;
pub mod config;
pub mod document;
pub mod error;
pub mod narrate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collaborators::{
    Collaborators, ImageDescriber, NoSpeech, OcrEngine, SpeechSynthesizer, Summarizer,
    SynthesisRequest,
};
pub use config::{
    ImageAttribution, NarrationConfig, NarrationConfigBuilder, OversizePolicy, VoiceGender,
    VoiceParams,
};
pub use document::{BlockStyle, ContentBlock, EnrichedBlock, ImageRef};
pub use error::{CollaboratorError, NarratorError};
pub use narrate::{write_atomic, Narrator};
pub use output::{FileNarration, NarrationArtifact, NarrationStats, PreparationStats, PreparedText};
pub use pipeline::chunk::NarrationSegment;
pub use progress::{NarrationProgressCallback, NoopProgressCallback, ProgressCallback};
