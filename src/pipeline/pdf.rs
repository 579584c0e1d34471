//! PDF extraction via pdfium: page text, page-scoped images and OCR renders.
//!
//! ## Headings
//!
//! PDFs carry no paragraph styles, so headings are inferred from font size.
//! Each page's body size is the size covering the most characters; a short
//! line set clearly larger than that becomes a heading block, ranked by how
//! much larger it is. See [`split_page`].
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. The whole document pass runs on the blocking pool;
//! network calls (OCR) happen afterwards in [`crate::pipeline::extract`].
//!
//! ## Why cap pixels?
//!
//! Pages are only rasterised when they have no text layer. Capping the
//! longest edge keeps memory bounded on poster-sized pages and matches the
//! resolution vision models read best.

use crate::document::{BlockStyle, ContentBlock, ImageRef};
use crate::error::NarratorError;
use crate::pipeline::encode::png_image_ref;
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything pulled from one page in the blocking pass.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// 1-based page number.
    pub number: usize,
    pub text: String,
    /// The same text as visual lines with their font sizes.
    pub lines: Vec<TextLine>,
    /// Image objects placed on this page, in object order.
    pub images: Vec<ImageRef>,
    /// Full-page render, present only when `text` is empty.
    pub page_image: Option<ImageRef>,
}

/// One visual line of page text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Largest scaled font size on the line, in points.
    pub font_size: f32,
}

impl TextLine {
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
        }
    }
}

/// A line at least this many times the body size is a heading.
const HEADING_MIN_RATIO: f32 = 1.2;
/// Longer lines are display text, not headings.
const HEADING_MAX_CHARS: usize = 120;

/// Bind to pdfium: `PDFIUM_LIB_PATH` (file or directory) first, then the
/// system library.
pub fn bind_pdfium() -> Result<Pdfium, NarratorError> {
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(&env_path);
        let lib = if p.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&p)
        } else {
            p
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => warn!(
                "PDFIUM_LIB_PATH '{}' could not be loaded ({}); trying system library",
                lib.display(),
                e
            ),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| NarratorError::PdfiumBindingFailed(e.to_string()))
}

/// Read every page of the PDF at `pdf_path`.
pub async fn read_pages(
    pdf_path: &Path,
    password: Option<&str>,
    ocr_render_pixels: u32,
) -> Result<Vec<RawPage>, NarratorError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || read_pages_blocking(&path, pwd.as_deref(), ocr_render_pixels))
        .await
        .map_err(|e| NarratorError::Internal(format!("PDF task panicked: {}", e)))?
}

fn read_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    ocr_render_pixels: u32,
) -> Result<Vec<RawPage>, NarratorError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(ocr_render_pixels as i32)
        .set_maximum_height(ocr_render_pixels as i32);

    let mut results = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let number = idx + 1;
        let unreadable = |e: PdfiumError| NarratorError::DocumentUnreadable {
            path: pdf_path.to_path_buf(),
            detail: format!("page {}: {:?}", number, e),
        };

        let page_text = page.text().map_err(unreadable)?;
        let text = page_text.all().trim().to_string();
        let lines = text_lines(&page_text);

        let mut images = Vec::new();
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let id = format!("page{}-image{}", number, images.len() + 1);
            // Masks and placement transforms applied, as drawn on the page.
            let processed = image_object
                .get_processed_image(&document)
                .or_else(|e| {
                    debug!("{}: processed image unavailable ({:?}); using raw bitmap", id, e);
                    image_object.get_raw_image()
                });
            match processed {
                Ok(raw) => match png_image_ref(&id, &raw) {
                    Ok(img) => images.push(img),
                    Err(e) => warn!("{}: PNG encode failed: {}", id, e),
                },
                Err(e) => warn!("{}: could not read image object: {:?}", id, e),
            }
        }

        let page_image = if text.is_empty() {
            let bitmap = page.render_with_config(&render_config).map_err(unreadable)?;
            let image = bitmap.as_image();
            debug!(
                "Page {} has no text layer; rendered {}x{} px for OCR",
                number,
                image.width(),
                image.height()
            );
            let id = format!("page{}-render", number);
            match png_image_ref(&id, &image) {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!("{}: PNG encode failed: {}", id, e);
                    None
                }
            }
        } else {
            None
        };

        debug!(
            "Page {}: {} chars, {} images",
            number,
            text.chars().count(),
            images.len()
        );
        results.push(RawPage {
            number,
            text,
            lines,
            images,
            page_image,
        });
    }

    Ok(results)
}

/// Group the page's characters into lines, keeping each line's largest font.
fn text_lines(page_text: &PdfPageText<'_>) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut current = TextLine::new(String::new(), 0.0);

    for ch in page_text.chars().iter() {
        match ch.unicode_char() {
            Some('\n') => lines.push(std::mem::replace(
                &mut current,
                TextLine::new(String::new(), 0.0),
            )),
            Some('\r') | None => {}
            Some(c) => {
                if !c.is_whitespace() {
                    current.font_size = current.font_size.max(ch.scaled_font_size().value);
                }
                current.text.push(c);
            }
        }
    }
    lines.push(current);

    lines
        .into_iter()
        .map(|l| TextLine::new(l.text.trim(), l.font_size))
        .filter(|l| !l.text.is_empty())
        .collect()
}

/// Split a page's lines into heading and body blocks, in reading order.
///
/// Adjacent heading lines of the same level merge into one heading. Body
/// lines between headings form one `Body` block each.
pub fn split_page(lines: &[TextLine]) -> Vec<ContentBlock> {
    let body_size = body_font_size(lines);
    let mut blocks: Vec<ContentBlock> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    for line in lines {
        match heading_level(line, body_size) {
            Some(level) => {
                if !body.is_empty() {
                    blocks.push(ContentBlock::new(body.join("\n"), BlockStyle::Body));
                    body.clear();
                }
                let continues_heading =
                    matches!(blocks.last(), Some(last) if last.style == BlockStyle::Heading(level));
                match blocks.last_mut().filter(|_| continues_heading) {
                    Some(last) => {
                        last.text.push(' ');
                        last.text.push_str(&line.text);
                    }
                    None => blocks.push(ContentBlock::new(
                        line.text.clone(),
                        BlockStyle::Heading(level),
                    )),
                }
            }
            None => body.push(&line.text),
        }
    }
    if !body.is_empty() {
        blocks.push(ContentBlock::new(body.join("\n"), BlockStyle::Body));
    }
    blocks
}

/// The font size carrying the most characters, in half-point buckets.
/// Ties go to the smaller size.
fn body_font_size(lines: &[TextLine]) -> f32 {
    let mut weight: HashMap<u32, usize> = HashMap::new();
    for line in lines.iter().filter(|l| l.font_size > 0.0) {
        let bucket = (line.font_size * 2.0).round() as u32;
        *weight.entry(bucket).or_default() += line.text.chars().count();
    }
    weight
        .into_iter()
        .max_by(|(a_size, a_chars), (b_size, b_chars)| {
            a_chars.cmp(b_chars).then(b_size.cmp(a_size))
        })
        .map(|(bucket, _)| bucket as f32 / 2.0)
        .unwrap_or(0.0)
}

fn heading_level(line: &TextLine, body_size: f32) -> Option<u8> {
    if body_size <= 0.0
        || line.text.chars().count() > HEADING_MAX_CHARS
        || !line.text.chars().any(char::is_alphabetic)
    {
        return None;
    }
    let ratio = line.font_size / body_size;
    if ratio >= 1.8 {
        Some(1)
    } else if ratio >= 1.4 {
        Some(2)
    } else if ratio >= HEADING_MIN_RATIO {
        Some(3)
    } else {
        None
    }
}

fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> NarratorError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            NarratorError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            NarratorError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        NarratorError::DocumentUnreadable {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(blocks: &[ContentBlock]) -> Vec<(BlockStyle, &str)> {
        blocks.iter().map(|b| (b.style, b.text.as_str())).collect()
    }

    #[test]
    fn larger_lines_become_headings_in_place() {
        let lines = vec![
            TextLine::new("Attention Is All You Need", 24.0),
            TextLine::new("The dominant sequence transduction models", 10.0),
            TextLine::new("are based on recurrent networks.", 10.0),
            TextLine::new("1 Introduction", 15.0),
            TextLine::new("Recurrent neural networks have been", 10.0),
            TextLine::new("firmly established.", 10.0),
        ];
        assert_eq!(
            texts(&split_page(&lines)),
            vec![
                (BlockStyle::Heading(1), "Attention Is All You Need"),
                (
                    BlockStyle::Body,
                    "The dominant sequence transduction models\nare based on recurrent networks."
                ),
                (BlockStyle::Heading(2), "1 Introduction"),
                (
                    BlockStyle::Body,
                    "Recurrent neural networks have been\nfirmly established."
                ),
            ]
        );
    }

    #[test]
    fn uniform_page_is_one_body_block() {
        let lines = vec![
            TextLine::new("Line one.", 11.0),
            TextLine::new("Line two.", 11.2),
        ];
        assert_eq!(
            texts(&split_page(&lines)),
            vec![(BlockStyle::Body, "Line one.\nLine two.")]
        );
    }

    #[test]
    fn wrapped_heading_lines_merge() {
        let lines = vec![
            TextLine::new("A Very Long Title", 20.0),
            TextLine::new("Across Two Lines", 20.0),
            TextLine::new("Body text that carries most of the characters here.", 10.0),
        ];
        let blocks = split_page(&lines);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "A Very Long Title Across Two Lines");
        assert_eq!(blocks[0].style, BlockStyle::Heading(1));
    }

    #[test]
    fn large_numbers_and_long_lines_stay_body() {
        let long = "x".repeat(HEADING_MAX_CHARS + 1);
        let body = "body ".repeat(60);
        let lines = vec![
            TextLine::new("42", 30.0),
            TextLine::new(long.as_str(), 16.0),
            TextLine::new(body.trim(), 10.0),
            TextLine::new("Slightly larger caption", 11.5),
        ];
        let blocks = split_page(&lines);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].style, BlockStyle::Body);
    }

    #[test]
    fn body_size_prefers_smaller_on_ties() {
        let lines = vec![TextLine::new("abcd", 12.0), TextLine::new("wxyz", 9.0)];
        assert_eq!(body_font_size(&lines), 9.0);
        assert_eq!(body_font_size(&[]), 0.0);
    }

    fn internal(e: PdfiumInternalError) -> PdfiumError {
        PdfiumError::PdfiumLibraryInternalError(e)
    }

    #[test]
    fn password_errors_are_classified() {
        let path = Path::new("locked.pdf");
        assert!(matches!(
            load_error(path, None, internal(PdfiumInternalError::PasswordError)),
            NarratorError::PasswordRequired { .. }
        ));
        assert!(matches!(
            load_error(path, Some("guess"), internal(PdfiumInternalError::PasswordError)),
            NarratorError::WrongPassword { .. }
        ));
        assert!(matches!(
            load_error(path, None, internal(PdfiumInternalError::FormatError)),
            NarratorError::DocumentUnreadable { .. }
        ));
    }
}
