//! Pipeline orchestrator.
//!
//! [`Narrator`] sequences the stages in two independent halves:
//!
//! * [`Narrator::prepare_text`]: validate → extract → enrich → clean;
//! * [`Narrator::narrate`]: chunk → synthesise → merge.
//!
//! [`Narrator::narrate_file`] runs both and keeps the text even when the
//! audio half fails. Every collaborator call is awaited before the next one
//! is issued, so given deterministic collaborators the output is
//! byte-for-byte deterministic.

use crate::collaborators::Collaborators;
use crate::config::{NarrationConfig, VoiceParams};
use crate::error::NarratorError;
use crate::output::{
    FileNarration, NarrationArtifact, NarrationStats, PreparationStats, PreparedText,
};
use crate::pipeline::{assemble, chunk, clean, enrich, extract, input};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Document-to-narration pipeline bound to one configuration and one set of
/// collaborators.
#[derive(Clone)]
pub struct Narrator {
    config: NarrationConfig,
    collaborators: Collaborators,
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Narrator {
    /// Build a narrator around explicitly constructed collaborators.
    pub fn new(config: NarrationConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Build a narrator with the default collaborators, resolved from
    /// `config` and the environment.
    pub fn from_config(config: NarrationConfig) -> Result<Self, NarratorError> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &NarrationConfig {
        &self.config
    }

    /// A narrator sharing these collaborators under a different configuration.
    pub fn with_config(&self, config: NarrationConfig) -> Self {
        Self::new(config, self.collaborators.clone())
    }

    /// Extract, enrich and clean the document at `path`.
    ///
    /// # Errors
    /// Input errors (missing file, unsupported type, unreadable document)
    /// are returned before any collaborator is called. Summary, description
    /// and OCR failures never surface here; they leave empty fields.
    pub async fn prepare_text(&self, path: impl AsRef<Path>) -> Result<PreparedText, NarratorError> {
        let total_start = Instant::now();
        let path = path.as_ref();
        info!("Preparing narration text: {}", path.display());

        // ── Step 1: Validate and route ───────────────────────────────────
        let resolved = input::resolve_input(path)?;

        // ── Step 2: Extract ──────────────────────────────────────────────
        let extract_start = Instant::now();
        let extracted =
            extract::extract(&resolved, &self.config, self.collaborators.ocr.as_ref()).await?;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        let total_blocks = extracted.blocks.len();

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_complete(total_blocks);
        }

        // ── Step 3: Enrich ───────────────────────────────────────────────
        let enrich_start = Instant::now();
        let blocks = enrich::enrich_blocks(
            extracted.blocks,
            self.config.summary_prefix_chars,
            self.collaborators.summarizer.as_ref(),
            self.collaborators.describer.as_ref(),
            self.config.progress_callback.as_ref(),
        )
        .await;
        let enrich_duration_ms = enrich_start.elapsed().as_millis() as u64;

        // ── Step 4: Linearise and clean ──────────────────────────────────
        let raw = enrich::compose_raw_stream(&blocks);
        let cleaned_text = clean::clean_text(&raw);
        debug!(
            "Cleaned {} raw chars → {} chars",
            raw.chars().count(),
            cleaned_text.chars().count()
        );

        let stats = PreparationStats {
            document_kind: PreparationStats::kind_label(resolved.kind),
            total_blocks,
            ocr_blocks: extracted.ocr_blocks,
            summaries: blocks.iter().filter(|b| !b.summary.is_empty()).count(),
            images_described: blocks
                .iter()
                .filter(|b| !b.image_description.is_empty())
                .count(),
            cleaned_chars: cleaned_text.chars().count(),
            extract_duration_ms,
            enrich_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Text ready: {} blocks, {} images described, {} chars, {}ms",
            stats.total_blocks, stats.images_described, stats.cleaned_chars, stats.total_duration_ms
        );

        Ok(PreparedText {
            cleaned_text,
            blocks,
            stats,
        })
    }

    /// Narrate cleaned text with the configured voice.
    pub async fn narrate(&self, text: &str) -> Result<NarrationArtifact, NarratorError> {
        self.narrate_with(text, &self.config.voice).await
    }

    /// Narrate cleaned text with an explicit voice.
    ///
    /// # Errors
    /// [`NarratorError::SynthesisFailed`] on the first failed segment; no
    /// partial audio is returned.
    pub async fn narrate_with(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> Result<NarrationArtifact, NarratorError> {
        voice.validate()?;
        let start = Instant::now();

        let segments = chunk::chunk_text(text, self.config.max_chunk_chars, self.config.oversize_policy);
        let oversized_segments = segments.iter().filter(|s| s.oversized).count();
        info!(
            "Narrating {} segments ({} oversized) as {}/{}",
            segments.len(),
            oversized_segments,
            voice.gender.as_str(),
            voice.language_code
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_narration_start(segments.len());
        }

        let merged = assemble::assemble(
            &segments,
            voice,
            self.config.silence_gap_ms,
            self.collaborators.synthesizer.as_ref(),
            self.config.progress_callback.as_ref(),
        )
        .await?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_narration_complete(segments.len(), merged.duration_ms);
        }

        let stats = NarrationStats {
            segments: segments.len(),
            oversized_segments,
            audio_bytes: merged.wav.len(),
            duration_ms: merged.duration_ms,
            sample_rate: merged.sample_rate,
            channels: merged.channels,
            synthesis_duration_ms: start.elapsed().as_millis() as u64,
        };

        Ok(NarrationArtifact {
            audio: merged.wav,
            text: text.to_string(),
            stats,
        })
    }

    /// Prepare the text of `path`, then narrate it.
    ///
    /// Returns `Err` only when text preparation fails. A narration failure
    /// is reported in [`FileNarration::audio`] next to the prepared text.
    pub async fn narrate_file(&self, path: impl AsRef<Path>) -> Result<FileNarration, NarratorError> {
        let text = self.prepare_text(path).await?;
        let audio = self.narrate(&text.cleaned_text).await;
        Ok(FileNarration { text, audio })
    }

    /// Narrate `path` and write the WAV to `audio_out` (and optionally the
    /// cleaned text to `text_out`).
    ///
    /// The text file is written before synthesis starts, so it survives a
    /// synthesis failure. Both writes are atomic (temp file + rename).
    pub async fn narrate_to_file(
        &self,
        path: impl AsRef<Path>,
        audio_out: impl AsRef<Path>,
        text_out: Option<&Path>,
    ) -> Result<NarrationStats, NarratorError> {
        let text = self.prepare_text(path).await?;
        if let Some(text_path) = text_out {
            write_atomic(text_path, text.cleaned_text.as_bytes()).await?;
        }
        let artifact = self.narrate(&text.cleaned_text).await?;
        write_atomic(audio_out.as_ref(), &artifact.audio).await?;
        Ok(artifact.stats)
    }

    /// Synchronous wrapper around [`Narrator::narrate_file`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn narrate_file_sync(&self, path: impl AsRef<Path>) -> Result<FileNarration, NarratorError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| NarratorError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.narrate_file(path))
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), NarratorError> {
    let write_err = |e| NarratorError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
