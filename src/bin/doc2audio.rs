//! CLI binary for edgequake-doc2audio.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `NarrationConfig` and writes the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2audio::{
    write_atomic, Collaborators, ImageAttribution, NarrationConfig, NarrationProgressCallback,
    Narrator, OversizePolicy, ProgressCallback, VoiceGender,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while blocks are enriched, then a
/// bar over synthesis segments with one log line per segment.
struct CliProgressCallback {
    bar: ProgressBar,
    segment_started: Mutex<Option<Instant>>,
    enriched: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Reading");
        bar.set_message("Extracting document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            segment_started: Mutex::new(None),
            enriched: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once the segment count is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} segments  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_position(0);
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Narrating");
        self.bar.reset_eta();
    }

    fn take_elapsed_secs(&self) -> f64 {
        self.segment_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl NarrationProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, total_blocks: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracted {total_blocks} blocks"))
        ));
        self.bar.set_prefix("Enriching");
    }

    fn on_block_enriched(&self, _index: usize, total_blocks: usize, described_image: bool) {
        let done = self.enriched.fetch_add(1, Ordering::SeqCst) + 1;
        let suffix = if described_image { "  (image described)" } else { "" };
        self.bar
            .set_message(format!("block {done}/{total_blocks}{suffix}"));
    }

    fn on_narration_start(&self, total_segments: usize) {
        self.activate_bar(total_segments);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Synthesising {total_segments} segments…"))
        ));
    }

    fn on_segment_start(&self, index: usize, _total: usize) {
        if let Ok(mut s) = self.segment_started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(format!("segment {}", index + 1));
    }

    fn on_segment_complete(&self, index: usize, total: usize, audio_bytes: usize) {
        let elapsed = self.take_elapsed_secs();
        self.bar.println(format!(
            "  {} Segment {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{:>6} KiB", audio_bytes / 1024)),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_segment_error(&self, index: usize, total: usize, error: &str) {
        let elapsed = self.take_elapsed_secs();
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Segment {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
    }

    fn on_narration_complete(&self, total_segments: usize, duration_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} segments narrated  {}",
            green("✔"),
            bold(&total_segments.to_string()),
            dim(&format_duration(duration_ms)),
        );
    }
}

fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}.{:01}", secs / 60, secs % 60, (ms % 1000) / 100)
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrate a Word document (writes report.wav next to it)
  doc2audio report.docx

  # Choose the output and keep the cleaned text
  doc2audio paper.pdf -o paper.wav --text-out paper.txt

  # Only print the cleaned narration text (no speech credentials needed)
  doc2audio --text-only paper.pdf

  # Female British voice, smaller segments
  doc2audio --voice female --language en-GB --max-chunk-chars 3000 book.docx

  # Encrypted PDF, specific model
  doc2audio --password s3cret --provider openai --model gpt-4.1-mini scan.pdf

  # JSON report (prepared text + narration stats) on stdout
  doc2audio --json report.docx -o report.wav > report.json

SUPPORTED INPUTS:
  .pdf     text layer via pdfium; text-less pages go through OCR
  .docx    paragraphs, headings and embedded images
  .doc     accepted only when it is really OOXML; legacy binary files
           must be re-saved as .docx

ENVIRONMENT VARIABLES:
  GOOGLE_TTS_API_KEY      Google Cloud Text-to-Speech API key
  GOOGLE_API_KEY          Fallback key for speech synthesis
  OPENAI_API_KEY          OpenAI API key (summaries, descriptions, OCR)
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory or file of an existing libpdfium

SETUP:
  1. Set API keys:    export OPENAI_API_KEY=sk-...  GOOGLE_TTS_API_KEY=...
  2. Narrate:         doc2audio document.pdf -o document.wav
"#;

/// Turn PDF and Word documents into narrated audio.
#[derive(Parser, Debug)]
#[command(
    name = "doc2audio",
    version,
    about = "Turn PDF and Word documents into narrated audio",
    long_about = "Extract the text of a PDF or Word document, describe its images in \
context, clean and chunk the result, and narrate it with a speech-synthesis service \
into a single WAV file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local .pdf, .docx or .doc file.
    input: PathBuf,

    /// Write the WAV here. Default: input path with a .wav extension.
    #[arg(short, long, env = "DOC2AUDIO_OUTPUT")]
    output: Option<PathBuf>,

    /// Also write the cleaned narration text to this file.
    #[arg(long, env = "DOC2AUDIO_TEXT_OUT")]
    text_out: Option<PathBuf>,

    /// Stop after text preparation; print the cleaned text.
    #[arg(long, env = "DOC2AUDIO_TEXT_ONLY")]
    text_only: bool,

    /// Character budget for one synthesis request.
    #[arg(long, env = "DOC2AUDIO_MAX_CHUNK_CHARS", default_value_t = 4500,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_chunk_chars: u64,

    /// Silence between segments, in milliseconds.
    #[arg(long, env = "DOC2AUDIO_SILENCE_MS", default_value_t = 300)]
    silence_ms: u32,

    /// Voice gender: male, female, neutral.
    #[arg(long, env = "DOC2AUDIO_VOICE", value_enum, default_value = "neutral")]
    voice: VoiceArg,

    /// BCP-47 language code for the voice.
    #[arg(long, env = "DOC2AUDIO_LANGUAGE", default_value = "en-US")]
    language: String,

    /// Image attribution for Word documents.
    #[arg(long, env = "DOC2AUDIO_ATTRIBUTION", value_enum, default_value = "placement")]
    attribution: AttributionArg,

    /// Handling of single sentences longer than the budget.
    #[arg(long, env = "DOC2AUDIO_OVERSIZE", value_enum, default_value = "pass-through")]
    oversize: OversizeArg,

    /// LLM model ID for summaries, descriptions and OCR.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOC2AUDIO_PASSWORD")]
    password: Option<String>,

    /// Retries per summary/description/OCR call.
    #[arg(long, env = "DOC2AUDIO_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call timeout for collaborators, in seconds.
    #[arg(long, env = "DOC2AUDIO_API_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: u64,

    /// Print a JSON report on stdout.
    #[arg(long, env = "DOC2AUDIO_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2AUDIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2AUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2AUDIO_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum VoiceArg {
    Male,
    Female,
    Neutral,
}

impl From<VoiceArg> for VoiceGender {
    fn from(v: VoiceArg) -> Self {
        match v {
            VoiceArg::Male => VoiceGender::Male,
            VoiceArg::Female => VoiceGender::Female,
            VoiceArg::Neutral => VoiceGender::Neutral,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum AttributionArg {
    Placement,
    SharedPool,
}

impl From<AttributionArg> for ImageAttribution {
    fn from(v: AttributionArg) -> Self {
        match v {
            AttributionArg::Placement => ImageAttribution::Placement,
            AttributionArg::SharedPool => ImageAttribution::SharedPool,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OversizeArg {
    PassThrough,
    Truncate,
}

impl From<OversizeArg> for OversizePolicy {
    fn from(v: OversizeArg) -> Self {
        match v {
            OversizeArg::PassThrough => OversizePolicy::PassThrough,
            OversizeArg::Truncate => OversizePolicy::Truncate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build narrator ───────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn NarrationProgressCallback>),
    )?;

    let collaborators = if cli.text_only {
        Collaborators::text_only(&config)
    } else {
        Collaborators::from_config(&config)
    }
    .context("Failed to set up collaborators (are the API keys set?)")?;
    let narrator = Narrator::new(config, collaborators);

    // ── Prepare text ─────────────────────────────────────────────────────
    let prepared = narrator
        .prepare_text(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()));
    let prepared = match prepared {
        Ok(p) => p,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.finish();
            }
            return Err(e);
        }
    };

    if let Some(ref text_path) = cli.text_out {
        write_atomic(text_path, prepared.cleaned_text.as_bytes())
            .await
            .with_context(|| format!("Failed to write text to {}", text_path.display()))?;
    }

    if cli.text_only {
        if let Some(ref cb) = progress {
            cb.finish();
        }
        if cli.json {
            let json =
                serde_json::to_string_pretty(&prepared).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(prepared.cleaned_text.as_bytes())
                .context("Failed to write to stdout")?;
            if !prepared.cleaned_text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {} blocks  {} images described  {}ms",
                green("✔"),
                prepared.stats.total_blocks,
                prepared.stats.images_described,
                prepared.stats.total_duration_ms,
            );
        }
        return Ok(());
    }

    // ── Narrate ──────────────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let artifact = match narrator.narrate(&prepared.cleaned_text).await {
        Ok(a) => a,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.finish();
            }
            return Err(e).context("Narration failed");
        }
    };

    write_atomic(&output_path, &artifact.audio)
        .await
        .with_context(|| format!("Failed to write audio to {}", output_path.display()))?;

    if cli.json {
        let report = serde_json::json!({
            "output": output_path,
            "text": prepared,
            "narration": artifact.stats,
        });
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &artifact.stats;
        eprintln!(
            "{}  {} segments  {}  →  {}",
            if stats.oversized_segments == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.segments,
            format_duration(stats.duration_ms),
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {} blocks  /  {} images described  /  {} OCR pages",
            dim(&prepared.stats.total_blocks.to_string()),
            dim(&prepared.stats.images_described.to_string()),
            dim(&prepared.stats.ocr_blocks.to_string()),
        );
        if stats.oversized_segments > 0 {
            eprintln!(
                "   {} segments exceed the character budget",
                red(&stats.oversized_segments.to_string())
            );
        }
    }

    Ok(())
}

/// Map CLI args to `NarrationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<NarrationConfig> {
    let max_chunk_chars =
        usize::try_from(cli.max_chunk_chars).context("--max-chunk-chars is too large")?;

    let mut builder = NarrationConfig::builder()
        .max_chunk_chars(max_chunk_chars)
        .silence_gap_ms(cli.silence_ms)
        .voice_gender(cli.voice.clone().into())
        .language_code(cli.language.clone())
        .image_attribution(cli.attribution.clone().into())
        .oversize_policy(cli.oversize.clone().into())
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `dir/name.pdf` → `dir/name.wav`.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("wav")
}
