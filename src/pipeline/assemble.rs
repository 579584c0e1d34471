//! Audio assembly: synthesise segments in order, merge WAV with silence gaps.
//!
//! Each segment is synthesised and awaited before the next request is sent.
//! Results are spooled to a private temp directory as
//! `segment-<index>.wav` and read back in index order for the merge, so
//! memory holds one segment plus the output at a time.
//!
//! ## Merge contract
//!
//! All segments must share one format (16-bit PCM from the default
//! synthesiser). Output = seg₀ + gap + seg₁ + gap + … + segₙ₋₁: no leading or
//! trailing silence. Any synthesis failure aborts the whole assembly; nothing
//! is retried here.

use crate::collaborators::{SpeechSynthesizer, SynthesisRequest};
use crate::config::VoiceParams;
use crate::error::NarratorError;
use crate::pipeline::chunk::NarrationSegment;
use crate::progress::ProgressCallback;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Read};
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Merged narration audio.
#[derive(Debug, Clone)]
pub struct MergedAudio {
    /// Complete WAV file.
    pub wav: Vec<u8>,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Synthesise `segments` in order and merge the results.
pub async fn assemble(
    segments: &[NarrationSegment],
    voice: &VoiceParams,
    silence_gap_ms: u32,
    synthesizer: &dyn SpeechSynthesizer,
    progress: Option<&ProgressCallback>,
) -> Result<MergedAudio, NarratorError> {
    if segments.is_empty() {
        return Err(NarratorError::NoSegments);
    }
    let total = segments.len();

    let spool = TempDir::new()
        .map_err(|e| NarratorError::AudioMergeFailed(format!("cannot create spool dir: {e}")))?;
    let mut paths: Vec<PathBuf> = Vec::with_capacity(total);

    for segment in segments {
        if let Some(cb) = progress {
            cb.on_segment_start(segment.index, total);
        }

        let request = SynthesisRequest {
            text: segment.text.clone(),
            voice: voice.clone(),
        };
        let audio = match synthesizer.synthesize(&request).await {
            Ok(audio) => audio,
            Err(e) => {
                let detail = e.to_string();
                warn!("Segment {}/{} failed: {}", segment.index + 1, total, detail);
                if let Some(cb) = progress {
                    cb.on_segment_error(segment.index, total, &detail);
                }
                return Err(NarratorError::SynthesisFailed {
                    segment: segment.index,
                    detail,
                });
            }
        };

        let path = spool.path().join(format!("segment-{}.wav", segment.index));
        tokio::fs::write(&path, &audio).await.map_err(|e| {
            NarratorError::AudioMergeFailed(format!("cannot spool segment {}: {e}", segment.index))
        })?;
        debug!(
            "Segment {}/{}: {} chars → {} bytes",
            segment.index + 1,
            total,
            segment.text.chars().count(),
            audio.len()
        );
        if let Some(cb) = progress {
            cb.on_segment_complete(segment.index, total, audio.len());
        }
        paths.push(path);
    }

    let merged = tokio::task::spawn_blocking(move || {
        let result = merge_wav_files(&paths, silence_gap_ms);
        drop(spool);
        result
    })
    .await
    .map_err(|e| NarratorError::Internal(format!("Merge task panicked: {}", e)))??;

    info!(
        "Merged {} segments → {} ms, {} bytes",
        total,
        merged.duration_ms,
        merged.wav.len()
    );
    Ok(merged)
}

/// Merge spooled WAV files, in the given order.
pub fn merge_wav_files(paths: &[PathBuf], silence_gap_ms: u32) -> Result<MergedAudio, NarratorError> {
    let readers = paths
        .iter()
        .map(|p| {
            WavReader::open(p).map_err(|e| {
                NarratorError::AudioMergeFailed(format!("{}: {}", p.display(), e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    merge_readers(readers, silence_gap_ms)
}

/// Merge in-memory WAV buffers, in the given order.
pub fn merge_wav_buffers(buffers: &[Vec<u8>], silence_gap_ms: u32) -> Result<MergedAudio, NarratorError> {
    let readers = buffers
        .iter()
        .enumerate()
        .map(|(i, b)| {
            WavReader::new(Cursor::new(b.as_slice()))
                .map_err(|e| NarratorError::AudioMergeFailed(format!("segment {i}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    merge_readers(readers, silence_gap_ms)
}

fn merge_readers<R: Read>(readers: Vec<WavReader<R>>, silence_gap_ms: u32) -> Result<MergedAudio, NarratorError> {
    let first = readers.first().ok_or(NarratorError::NoSegments)?;
    let spec = first.spec();
    if spec.sample_format != SampleFormat::Int {
        return Err(NarratorError::AudioMergeFailed(
            "floating-point WAV segments are not supported".into(),
        ));
    }
    for (i, r) in readers.iter().enumerate().skip(1) {
        if !same_format(&r.spec(), &spec) {
            return Err(NarratorError::AudioMergeFailed(format!(
                "segment {} is {} Hz/{} ch/{} bit, expected {} Hz/{} ch/{} bit",
                i,
                r.spec().sample_rate,
                r.spec().channels,
                r.spec().bits_per_sample,
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample
            )));
        }
    }

    let gap_frames = u64::from(spec.sample_rate) * u64::from(silence_gap_ms) / 1000;
    let gap_samples = gap_frames * u64::from(spec.channels);
    let count = readers.len();
    let merge_err = |e: hound::Error| NarratorError::AudioMergeFailed(e.to_string());

    let mut out = Vec::new();
    let mut total_frames = 0u64;
    {
        let mut writer = WavWriter::new(Cursor::new(&mut out), spec).map_err(merge_err)?;
        for (i, mut reader) in readers.into_iter().enumerate() {
            total_frames += u64::from(reader.duration());
            for sample in reader.samples::<i32>() {
                writer.write_sample(sample.map_err(merge_err)?).map_err(merge_err)?;
            }
            if i + 1 < count {
                for _ in 0..gap_samples {
                    writer.write_sample(0i32).map_err(merge_err)?;
                }
                total_frames += gap_frames;
            }
        }
        writer.finalize().map_err(merge_err)?;
    }

    Ok(MergedAudio {
        wav: out,
        duration_ms: total_frames * 1000 / u64::from(spec.sample_rate),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn same_format(a: &WavSpec, b: &WavSpec) -> bool {
    a.sample_rate == b.sample_rate
        && a.channels == b.channels
        && a.bits_per_sample == b.bits_per_sample
        && a.sample_format == b.sample_format
}
