//! Extraction & normalisation: one routed entry point over both formats.
//!
//! PDFs yield each page's inferred headings and body runs, page by page;
//! Word documents one block per paragraph. Pages without a text layer are
//! sent to the OCR collaborator one at a time, in page order, and become a
//! single body block. An OCR failure leaves the page's text empty.

use crate::collaborators::OcrEngine;
use crate::config::NarrationConfig;
use crate::document::{BlockStyle, ContentBlock, ExtractedDocument};
use crate::error::NarratorError;
use crate::pipeline::input::{DocumentKind, ResolvedInput};
use crate::pipeline::{docx, pdf};
use tracing::{info, warn};

/// Extract the blocks of a validated document.
pub async fn extract(
    input: &ResolvedInput,
    config: &NarrationConfig,
    ocr: &dyn OcrEngine,
) -> Result<ExtractedDocument, NarratorError> {
    let document = match input.kind {
        DocumentKind::Pdf => {
            let pages =
                pdf::read_pages(&input.path, config.password.as_deref(), config.ocr_render_pixels)
                    .await?;
            pages_to_blocks(pages, ocr).await
        }
        DocumentKind::Word => {
            let path = input.path.clone();
            let attribution = config.image_attribution;
            let blocks =
                tokio::task::spawn_blocking(move || docx::extract_docx(&path, attribution))
                    .await
                    .map_err(|e| NarratorError::Internal(format!("DOCX task panicked: {}", e)))??;
            ExtractedDocument {
                blocks,
                ocr_blocks: 0,
            }
        }
    };

    info!(
        "Extracted {} blocks ({} via OCR) from {}",
        document.blocks.len(),
        document.ocr_blocks,
        input.path.display()
    );
    Ok(document)
}

/// Turn raw PDF pages into blocks, filling text-less pages through OCR.
pub async fn pages_to_blocks(pages: Vec<pdf::RawPage>, ocr: &dyn OcrEngine) -> ExtractedDocument {
    let mut blocks = Vec::with_capacity(pages.len());
    let mut ocr_blocks = 0;

    for page in pages {
        let mut page_blocks = if page.lines.is_empty() {
            Vec::new()
        } else {
            pdf::split_page(&page.lines)
        };

        if page_blocks.is_empty() {
            let mut text = page.text;
            if let Some(page_image) = page.page_image.as_ref().filter(|_| text.is_empty()) {
                match ocr.recognize(page_image).await {
                    Ok(recognized) => {
                        text = recognized.trim().to_string();
                        if !text.is_empty() {
                            ocr_blocks += 1;
                        }
                    }
                    Err(e) => warn!("Page {}: OCR failed, keeping empty text: {}", page.number, e),
                }
            }
            page_blocks.push(ContentBlock::new(text, BlockStyle::Body));
        }

        // Page images ride on the page's first body block.
        match page_blocks.iter().position(|b| b.style == BlockStyle::Body) {
            Some(i) => page_blocks[i].images = page.images,
            None => page_blocks.push(ContentBlock::new("", BlockStyle::Body).with_images(page.images)),
        }
        blocks.extend(page_blocks);
    }

    ExtractedDocument { blocks, ocr_blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ImageRef;
    use crate::error::CollaboratorError;
    use crate::pipeline::docx::tests::{build_docx, document_xml};
    use crate::pipeline::input::resolve_input;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedOcr {
        reply: Result<String, CollaboratorError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, _page_image: &ImageRef) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn page(number: usize, text: &str) -> pdf::RawPage {
        pdf::RawPage {
            number,
            text: text.to_string(),
            lines: Vec::new(),
            images: Vec::new(),
            page_image: text.is_empty().then(|| ImageRef {
                id: format!("page{number}-render"),
                mime_type: Some("image/png".into()),
                data: vec![1, 2, 3],
            }),
        }
    }

    #[tokio::test]
    async fn ocr_fills_only_textless_pages() {
        let ocr = ScriptedOcr {
            reply: Ok("  scanned words \n".into()),
            calls: AtomicUsize::new(0),
        };
        let doc = pages_to_blocks(vec![page(1, "Typed."), page(2, ""), page(3, "More.")], &ocr).await;

        let texts: Vec<&str> = doc.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Typed.", "scanned words", "More."]);
        assert_eq!(doc.ocr_blocks, 1);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_headings_precede_body_and_keep_page_images() {
        let mut first = page(1, "Results\nThe numbers went up and kept going up all year.");
        first.lines = vec![
            pdf::TextLine::new("Results", 18.0),
            pdf::TextLine::new("The numbers went up and kept going up all year.", 10.0),
        ];
        first.images = vec![ImageRef {
            id: "page1-image1".into(),
            mime_type: Some("image/png".into()),
            data: vec![1],
        }];
        let mut second = page(2, "Appendix");
        second.lines = vec![pdf::TextLine::new("Appendix", 10.0)];

        let ocr = ScriptedOcr {
            reply: Ok(String::new()),
            calls: AtomicUsize::new(0),
        };
        let doc = pages_to_blocks(vec![first, second], &ocr).await;

        let got: Vec<(BlockStyle, &str, usize)> = doc
            .blocks
            .iter()
            .map(|b| (b.style, b.text.as_str(), b.images.len()))
            .collect();
        assert_eq!(
            got,
            vec![
                (BlockStyle::Heading(1), "Results", 0),
                (
                    BlockStyle::Body,
                    "The numbers went up and kept going up all year.",
                    1
                ),
                (BlockStyle::Body, "Appendix", 0),
            ]
        );
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_size_page_is_one_body_block_with_images() {
        let mut only = page(1, "Big");
        only.lines = vec![pdf::TextLine::new("Big", 30.0)];
        only.images = vec![ImageRef {
            id: "page1-image1".into(),
            mime_type: None,
            data: vec![1],
        }];
        let ocr = ScriptedOcr {
            reply: Ok(String::new()),
            calls: AtomicUsize::new(0),
        };
        let doc = pages_to_blocks(vec![only], &ocr).await;
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].style, BlockStyle::Body);
        assert_eq!(doc.blocks[0].images.len(), 1);
    }

    #[tokio::test]
    async fn ocr_failure_keeps_empty_text() {
        let ocr = ScriptedOcr {
            reply: Err(CollaboratorError::EmptyResponse { collaborator: "ocr" }),
            calls: AtomicUsize::new(0),
        };
        let doc = pages_to_blocks(vec![page(1, "")], &ocr).await;
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text, "");
        assert_eq!(doc.ocr_blocks, 0);
    }

    #[tokio::test]
    async fn word_documents_route_to_docx() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("story.docx");
        let xml = document_xml(r#"<w:p><w:r><w:t>Once.</w:t></w:r></w:p><w:p><w:r><w:t>Twice.</w:t></w:r></w:p>"#);
        std::fs::write(&path, build_docx(&xml, None, &[])).unwrap();

        let input = resolve_input(&path).unwrap();
        let ocr = ScriptedOcr {
            reply: Ok(String::new()),
            calls: AtomicUsize::new(0),
        };
        let doc = extract(&input, &NarrationConfig::default(), &ocr).await.unwrap();
        let texts: Vec<&str> = doc.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Once.", "Twice."]);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }
}
