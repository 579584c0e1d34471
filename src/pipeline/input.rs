//! Input validation and routing.
//!
//! Routing is a fixed extension table; the document contents only confirm
//! the choice. Checks run in this order so each failure names the real
//! problem: existence, read permission, extension, magic bytes. Nothing is
//! parsed until all four pass.

use crate::error::NarratorError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extraction strategy selected for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
}

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

impl DocumentKind {
    /// Extension table. Matching is case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" | "doc" => Some(DocumentKind::Word),
            _ => None,
        }
    }
}

/// A validated document path with its routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

/// Validate `path` and pick its extraction strategy.
pub fn resolve_input(path: &Path) -> Result<ResolvedInput, NarratorError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(NarratorError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(NarratorError::PermissionDenied { path });
        }
        Err(e) => {
            return Err(NarratorError::DocumentUnreadable {
                path,
                detail: e.to_string(),
            });
        }
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let kind = match DocumentKind::from_extension(&extension) {
        Some(kind) => kind,
        None => return Err(NarratorError::UnsupportedFileType { path, extension }),
    };

    let mut magic = [0u8; 8];
    let n = read_prefix(&mut file, &mut magic).map_err(|e| NarratorError::DocumentUnreadable {
        path: path.clone(),
        detail: e.to_string(),
    })?;
    check_magic(&path, kind, &magic[..n])?;

    debug!("Resolved {:?} document: {}", kind, path.display());
    Ok(ResolvedInput { path, kind })
}

fn read_prefix(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn check_magic(path: &Path, kind: DocumentKind, magic: &[u8]) -> Result<(), NarratorError> {
    let unreadable = |detail: String| NarratorError::DocumentUnreadable {
        path: path.to_path_buf(),
        detail,
    };

    match kind {
        DocumentKind::Pdf if magic.starts_with(PDF_MAGIC) => Ok(()),
        DocumentKind::Pdf => Err(unreadable(format!(
            "not a PDF (expected %PDF header, found {:02X?})",
            &magic[..magic.len().min(4)]
        ))),
        DocumentKind::Word if magic.starts_with(ZIP_MAGIC) => Ok(()),
        DocumentKind::Word if magic.starts_with(OLE_MAGIC) => Err(unreadable(
            "legacy binary Word format is not supported; re-save the file as .docx".to_string(),
        )),
        DocumentKind::Word => Err(unreadable(
            "not a Word document (expected a ZIP-based .docx package)".to_string(),
        )),
    }
}
