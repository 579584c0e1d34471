//! Strongly-typed document model shared by every pipeline stage.
//!
//! Extraction produces [`ContentBlock`]s in reading order; enrichment wraps
//! each one in an [`EnrichedBlock`]. The index of a block in the vector is its
//! only ordering key, and no stage ever reorders the vector.

use serde::{Deserialize, Serialize};

/// Structural role of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockStyle {
    /// Document title (Word `Title` style).
    Title,
    /// Heading with its outline level (1 = top level).
    Heading(u8),
    /// Ordinary running text. (default)
    #[default]
    Body,
}

impl BlockStyle {
    /// Map a Word paragraph style id (`Heading2`, `heading 2`, `Title`, …).
    pub fn from_word_style(style_id: &str) -> Self {
        let normalised: String = style_id
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        if normalised == "title" {
            return BlockStyle::Title;
        }
        if let Some(level) = normalised.strip_prefix("heading") {
            if let Ok(n) = level.parse::<u8>() {
                return BlockStyle::Heading(n.max(1));
            }
        }
        BlockStyle::Body
    }

    /// Whether this block opens a new section when linearised.
    pub fn is_heading(&self) -> bool {
        matches!(self, BlockStyle::Title | BlockStyle::Heading(_))
    }
}

/// An image payload, identified uniquely within its document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Stable id, e.g. `image3.png` (Word) or `page2-image1` (PDF).
    pub id: String,
    /// MIME type sniffed from the payload, `None` if unrecognised.
    pub mime_type: Option<String>,
    /// Raw encoded bytes (PNG, JPEG, …).
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRef")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One structural unit of extracted text with its associated images.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentBlock {
    pub text: String,
    pub style: BlockStyle,
    /// Candidate images in attribution order; enrichment consumes the first.
    pub images: Vec<ImageRef>,
}

impl ContentBlock {
    pub fn new(text: impl Into<String>, style: BlockStyle) -> Self {
        Self {
            text: text.into(),
            style,
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageRef>) -> Self {
        self.images = images;
        self
    }
}

/// A block after enrichment.
///
/// `summary` is empty when `text` is empty or the summariser failed;
/// `image_description` is empty when no image was resolved and described.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrichedBlock {
    pub block: ContentBlock,
    pub summary: String,
    pub image_description: String,
}

/// Result of the extraction stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Blocks in reading order.
    pub blocks: Vec<ContentBlock>,
    /// Blocks whose text came from the OCR collaborator.
    pub ocr_blocks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_styles_map_to_block_styles() {
        assert_eq!(BlockStyle::from_word_style("Heading1"), BlockStyle::Heading(1));
        assert_eq!(BlockStyle::from_word_style("heading 3"), BlockStyle::Heading(3));
        assert_eq!(BlockStyle::from_word_style("Title"), BlockStyle::Title);
        assert_eq!(BlockStyle::from_word_style("Normal"), BlockStyle::Body);
        assert_eq!(BlockStyle::from_word_style("HeadingX"), BlockStyle::Body);
        assert_eq!(BlockStyle::from_word_style(""), BlockStyle::Body);
    }

    #[test]
    fn heading_detection() {
        assert!(BlockStyle::Title.is_heading());
        assert!(BlockStyle::Heading(2).is_heading());
        assert!(!BlockStyle::Body.is_heading());
    }

    #[test]
    fn image_debug_hides_payload() {
        let img = ImageRef {
            id: "image1.png".into(),
            mime_type: Some("image/png".into()),
            data: vec![0u8; 4096],
        };
        let dbg = format!("{img:?}");
        assert!(dbg.contains("4096"));
        assert!(!dbg.contains("0, 0, 0"));
    }
}
