//! Contextual enrichment: summaries, image descriptions, raw-stream composition.
//!
//! Runs in two passes over the block list:
//!
//! 1. summarise every block with text (on a bounded prefix only);
//! 2. describe the first image of every block that has one, using the best
//!    available summary as context.
//!
//! The second pass needs the *next* block's summary as a fallback, hence the
//! split. Collaborator failures become empty fields; block order is untouched.

use crate::collaborators::{ImageDescriber, Summarizer};
use crate::document::{ContentBlock, EnrichedBlock};
use crate::progress::ProgressCallback;
use crate::prompts::NO_CONTEXT_PLACEHOLDER;
use tracing::{debug, info, warn};

/// Prefix used for image descriptions in the raw text stream.
pub const IMAGE_DESCRIPTION_PREFIX: &str = "Image description:";

/// Attach summaries and image descriptions to `blocks`.
pub async fn enrich_blocks(
    blocks: Vec<ContentBlock>,
    summary_prefix_chars: usize,
    summarizer: &dyn Summarizer,
    describer: &dyn ImageDescriber,
    progress: Option<&ProgressCallback>,
) -> Vec<EnrichedBlock> {
    let total = blocks.len();

    // ── Pass 1: summaries ────────────────────────────────────────────────
    let mut summaries = Vec::with_capacity(total);
    for (idx, block) in blocks.iter().enumerate() {
        let text = block.text.trim();
        if text.is_empty() {
            summaries.push(String::new());
            continue;
        }
        let head = truncate_chars(text, summary_prefix_chars);
        match summarizer.summarize(head).await {
            Ok(summary) => {
                debug!("Block {}: summary of {} chars", idx, summary.chars().count());
                summaries.push(summary);
            }
            Err(e) => {
                warn!("Block {}: summary unavailable: {}", idx, e);
                summaries.push(String::new());
            }
        }
    }

    // ── Pass 2: image descriptions ───────────────────────────────────────
    let mut enriched = Vec::with_capacity(total);
    for (idx, block) in blocks.into_iter().enumerate() {
        let mut image_description = String::new();
        if let Some(image) = block.images.first() {
            let context = best_context(&summaries, idx);
            match describer.describe(image, context).await {
                Ok(sentence) => image_description = sentence,
                Err(e) => warn!("Block {}: image '{}' not described: {}", idx, image.id, e),
            }
        }

        if let Some(cb) = progress {
            cb.on_block_enriched(idx, total, !image_description.is_empty());
        }

        enriched.push(EnrichedBlock {
            block,
            summary: summaries[idx].clone(),
            image_description,
        });
    }

    info!(
        "Enriched {} blocks: {} summaries, {} image descriptions",
        total,
        enriched.iter().filter(|b| !b.summary.is_empty()).count(),
        enriched
            .iter()
            .filter(|b| !b.image_description.is_empty())
            .count()
    );
    enriched
}

/// The longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Context for describing the image of block `idx`: its own summary, else
/// the previous block's, else the next block's, else a placeholder.
pub fn best_context(summaries: &[String], idx: usize) -> &str {
    let own = summaries.get(idx);
    let previous = idx.checked_sub(1).and_then(|i| summaries.get(i));
    let next = summaries.get(idx + 1);

    [own, previous, next]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|s| !s.is_empty())
        .unwrap_or(NO_CONTEXT_PLACEHOLDER)
}

/// Linearise enriched blocks into the raw text stream fed to cleaning.
///
/// Headings become `# <text>` section lines, described images become an
/// `Image description:` paragraph, body text is kept as-is. Pieces are
/// separated by blank lines.
pub fn compose_raw_stream(blocks: &[EnrichedBlock]) -> String {
    let mut pieces: Vec<String> = Vec::new();

    for eb in blocks {
        let text = eb.block.text.trim();
        let heading = eb.block.style.is_heading();

        if heading && !text.is_empty() {
            pieces.push(format!("# {}", text));
        }
        if !eb.image_description.is_empty() {
            pieces.push(format!(
                "{} {}",
                IMAGE_DESCRIPTION_PREFIX,
                eb.image_description.trim()
            ));
        }
        if !heading && !text.is_empty() {
            pieces.push(text.to_string());
        }
    }

    pieces.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BlockStyle, ImageRef};
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Summarises by echoing the first word; fails on text starting with "FAIL".
    struct FirstWord {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Summarizer for FirstWord {
        async fn summarize(&self, text: &str) -> Result<String, CollaboratorError> {
            self.seen.lock().unwrap().push(text.to_string());
            if text.starts_with("FAIL") {
                return Err(CollaboratorError::EmptyResponse {
                    collaborator: "summarizer",
                });
            }
            Ok(format!("about {}", text.split_whitespace().next().unwrap_or("")))
        }
    }

    /// Describes an image by echoing its id and the context it was given.
    struct EchoDescriber;

    #[async_trait]
    impl ImageDescriber for EchoDescriber {
        async fn describe(&self, image: &ImageRef, context: &str) -> Result<String, CollaboratorError> {
            if image.id == "broken" {
                return Err(CollaboratorError::UnsupportedImage {
                    image_id: image.id.clone(),
                });
            }
            Ok(format!("{} [{}]", image.id, context))
        }
    }

    fn img(id: &str) -> ImageRef {
        ImageRef {
            id: id.into(),
            mime_type: Some("image/png".into()),
            data: vec![0],
        }
    }

    fn summarizer() -> FirstWord {
        FirstWord {
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn context_falls_back_previous_then_next() {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        assert_eq!(best_context(&s(&["own", "prev"]), 0), "own");
        assert_eq!(best_context(&s(&["prev", "", "next"]), 1), "prev");
        assert_eq!(best_context(&s(&["", "", "next"]), 1), "next");
        assert_eq!(best_context(&s(&["", ""]), 0), NO_CONTEXT_PLACEHOLDER);
        assert_eq!(best_context(&s(&[""]), 0), NO_CONTEXT_PLACEHOLDER);
    }

    #[tokio::test]
    async fn summaries_use_bounded_prefix_and_skip_empty_text() {
        let s = summarizer();
        let blocks = vec![
            ContentBlock::new("abcdefghij", BlockStyle::Body),
            ContentBlock::new("   ", BlockStyle::Body),
        ];
        let out = enrich_blocks(blocks, 4, &s, &EchoDescriber, None).await;
        assert_eq!(*s.seen.lock().unwrap(), vec!["abcd".to_string()]);
        assert_eq!(out[0].summary, "about abcd");
        assert_eq!(out[1].summary, "");
    }

    #[tokio::test]
    async fn image_gets_neighbour_context_when_own_summary_missing() {
        let s = summarizer();
        let blocks = vec![
            ContentBlock::new("Foxes run fast.", BlockStyle::Body),
            ContentBlock::new("", BlockStyle::Body).with_images(vec![img("fox.png"), img("other.png")]),
            ContentBlock::new("FAIL here", BlockStyle::Body).with_images(vec![img("next.png")]),
        ];
        let out = enrich_blocks(blocks, 2000, &s, &EchoDescriber, None).await;

        assert_eq!(out[1].image_description, "fox.png [about Foxes]");
        // Own summary failed, previous block is empty, so nothing useful is left.
        assert_eq!(out[2].summary, "");
        assert_eq!(
            out[2].image_description,
            format!("next.png [{}]", NO_CONTEXT_PLACEHOLDER)
        );
    }

    #[tokio::test]
    async fn describer_failure_degrades_to_empty() {
        let s = summarizer();
        let blocks = vec![ContentBlock::new("Text.", BlockStyle::Body).with_images(vec![img("broken")])];
        let out = enrich_blocks(blocks, 2000, &s, &EchoDescriber, None).await;
        assert_eq!(out[0].image_description, "");
        assert_eq!(out[0].summary, "about Text.");
    }

    #[test]
    fn raw_stream_layout() {
        let eb = |text: &str, style, desc: &str| EnrichedBlock {
            block: ContentBlock::new(text, style),
            summary: String::new(),
            image_description: desc.to_string(),
        };
        let raw = compose_raw_stream(&[
            eb("Intro", BlockStyle::Heading(1), ""),
            eb("Hello world.", BlockStyle::Body, "A red barn."),
            eb("", BlockStyle::Body, ""),
            eb("Chapter 1", BlockStyle::Title, ""),
        ]);
        assert_eq!(
            raw,
            "# Intro\n\nImage description: A red barn.\n\nHello world.\n\n# Chapter 1"
        );
    }
}
