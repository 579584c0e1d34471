//! Pipeline stages for document-to-narration conversion.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! can be tested on its own with stub collaborators.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ enrich ──▶ clean ──▶ chunk ──▶ assemble
//! (route)   (pdf/docx)  (LLM)     (text)    (budget)   (TTS + WAV)
//! ```
//!
//! 1. [`input`]  : validate the path and map its extension to a [`input::DocumentKind`]
//! 2. [`extract`]: run [`pdf`] or [`docx`] and fill text-less pages through OCR
//! 3. [`enrich`] : attach summaries and image descriptions, then linearise
//!    the blocks into one raw text stream
//! 4. [`clean`]  : normalise and restructure the stream into paragraphs with
//!    explicit section boundaries
//! 5. [`chunk`]  : pack paragraphs into segments under the character budget
//! 6. [`assemble`]: synthesise each segment in order and merge the WAV
//!    buffers with fixed silence gaps
//!
//! [`encode`] holds the image helpers shared by extraction and the vision
//! collaborator.

pub mod assemble;
pub mod chunk;
pub mod clean;
pub mod docx;
pub mod encode;
pub mod enrich;
pub mod extract;
pub mod input;
pub mod pdf;
