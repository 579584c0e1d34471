//! Error types for the edgequake-doc2audio library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NarratorError`]: **Fatal**: the stage cannot proceed at all
//!   (missing file, corrupt document, unsupported extension, a speech
//!   synthesis call that failed). Returned as `Err(NarratorError)` from the
//!   [`crate::narrate::Narrator`] entry points.
//!
//! * [`CollaboratorError`]: **Soft**: a summary, image description or OCR
//!   call returned nothing usable. Enrichment and extraction swallow it and
//!   substitute an empty string; only the audio stage promotes it to
//!   [`NarratorError::SynthesisFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2audio library.
#[derive(Debug, Error)]
pub enum NarratorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The extension does not map to any extraction strategy.
    #[error("Unsupported file type '{extension}' for '{path}'\nSupported: .pdf, .docx, .doc")]
    UnsupportedFileType { path: PathBuf, extension: String },

    /// The file exists but its contents cannot be parsed.
    #[error("Document '{path}' is unreadable: {detail}")]
    DocumentUnreadable { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The text/vision provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The speech-synthesis collaborator failed for one segment.
    ///
    /// Fatal to the audio stage only; cleaned text already produced is kept.
    #[error("Speech synthesis failed for segment {segment}: {detail}")]
    SynthesisFailed { segment: usize, detail: String },

    // ── Audio errors ──────────────────────────────────────────────────────
    /// Segment audio could not be decoded, spooled or merged.
    #[error("Audio merge failed: {0}")]
    AudioMergeFailed(String),

    /// The assembler was handed an empty segment list.
    #[error("No narration segments to synthesise")]
    NoSegments,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory) or install\n\
libpdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A soft failure from an external collaborator.
///
/// Never aborts text preparation; callers log it and fall back to an empty
/// field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The collaborator answered, but with nothing usable.
    #[error("{collaborator}: empty response")]
    EmptyResponse { collaborator: &'static str },

    /// The request itself failed after all retries.
    #[error("{collaborator}: request failed after {retries} retries: {detail}")]
    RequestFailed {
        collaborator: &'static str,
        retries: u32,
        detail: String,
    },

    /// The call did not return within the configured timeout.
    #[error("{collaborator}: timed out after {secs}s")]
    Timeout {
        collaborator: &'static str,
        secs: u64,
    },

    /// The image payload is in a format the vision collaborator cannot take.
    #[error("image '{image_id}' has unsupported format")]
    UnsupportedImage { image_id: String },

    /// The response body could not be decoded.
    #[error("{collaborator}: could not decode response: {detail}")]
    Decode {
        collaborator: &'static str,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_file_type_display() {
        let e = NarratorError::UnsupportedFileType {
            path: PathBuf::from("notes.txt"),
            extension: "txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'txt'"), "got: {msg}");
        assert!(msg.contains(".docx"));
    }

    #[test]
    fn synthesis_failed_display() {
        let e = NarratorError::SynthesisFailed {
            segment: 3,
            detail: "HTTP 500".into(),
        };
        assert!(e.to_string().contains("segment 3"));
        assert!(e.to_string().contains("HTTP 500"));
    }

    #[test]
    fn collaborator_timeout_display() {
        let e = CollaboratorError::Timeout {
            collaborator: "summarizer",
            secs: 30,
        };
        assert!(e.to_string().contains("summarizer"));
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn unreadable_display() {
        let e = NarratorError::DocumentUnreadable {
            path: PathBuf::from("a.docx"),
            detail: "missing word/document.xml".into(),
        };
        assert!(e.to_string().contains("word/document.xml"));
    }
}
