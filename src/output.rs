//! Result types returned by the [`crate::narrate::Narrator`] entry points.

use crate::document::EnrichedBlock;
use crate::error::NarratorError;
use crate::pipeline::input::DocumentKind;
use serde::{Deserialize, Serialize};

/// Cleaned narration text plus what went into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedText {
    /// Final cleaned text, ready for the chunker.
    pub cleaned_text: String,
    /// Enriched blocks in reading order.
    pub blocks: Vec<EnrichedBlock>,
    pub stats: PreparationStats,
}

/// Statistics for text preparation (extraction → enrichment → cleaning).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationStats {
    /// `"pdf"` or `"word"`.
    pub document_kind: String,
    pub total_blocks: usize,
    /// Blocks whose text came from OCR.
    pub ocr_blocks: usize,
    pub summaries: usize,
    pub images_described: usize,
    pub cleaned_chars: usize,
    pub extract_duration_ms: u64,
    pub enrich_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl PreparationStats {
    pub(crate) fn kind_label(kind: DocumentKind) -> String {
        match kind {
            DocumentKind::Pdf => "pdf".to_string(),
            DocumentKind::Word => "word".to_string(),
        }
    }
}

/// Final narration: one WAV stream plus the text it speaks.
#[derive(Clone, Serialize, Deserialize)]
pub struct NarrationArtifact {
    /// Complete 16-bit PCM WAV file.
    #[serde(skip)]
    pub audio: Vec<u8>,
    /// The cleaned text that was chunked and synthesised.
    pub text: String,
    pub stats: NarrationStats,
}

impl std::fmt::Debug for NarrationArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationArtifact")
            .field("audio_bytes", &self.audio.len())
            .field("text_chars", &self.text.chars().count())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Statistics for narration (chunking → synthesis → merge).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrationStats {
    pub segments: usize,
    /// Segments over budget because a single sentence was.
    pub oversized_segments: usize,
    pub audio_bytes: usize,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub synthesis_duration_ms: u64,
}

/// Outcome of narrating a whole file.
///
/// Text preparation succeeded if this value exists at all; `audio` carries
/// the narration stage's own result so a synthesis failure never discards
/// the cleaned text.
#[derive(Debug)]
pub struct FileNarration {
    pub text: PreparedText,
    pub audio: Result<NarrationArtifact, NarratorError>,
}
