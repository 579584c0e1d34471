//! Narration chunker: cleaned text → ordered, budget-bounded segments.
//!
//! Greedy paragraph packing. Paragraphs (split on blank lines) are joined
//! with `"\n\n"` until the next one would push the segment past the budget.
//! A paragraph that alone exceeds the budget is split on sentence boundaries
//! and packed the same way with single spaces. Lengths are counted in
//! characters, not bytes.
//!
//! The only segments allowed over budget come from a single sentence that is
//! itself longer than the budget; those are flagged `oversized` and handled
//! by the configured [`OversizePolicy`].

use crate::config::OversizePolicy;
use crate::pipeline::enrich::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Segment returned for empty or whitespace-only input.
pub const EMPTY_DOCUMENT_PLACEHOLDER: &str = "Document text is empty.";

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const PARAGRAPH_SEPARATOR_LEN: usize = 2;
const SENTENCE_SEPARATOR_LEN: usize = 1;

/// One text slice sized for a single speech-synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationSegment {
    /// 0-based position in the narration.
    pub index: usize,
    pub text: String,
    /// Longer than the budget (or truncated to it) because one sentence was.
    pub oversized: bool,
}

/// Sentence end: terminal punctuation followed by whitespace.
static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into narration segments of at most `max_chars` characters.
///
/// Never returns an empty list.
pub fn chunk_text(text: &str, max_chars: usize, policy: OversizePolicy) -> Vec<NarrationSegment> {
    if text.trim().is_empty() {
        return vec![NarrationSegment {
            index: 0,
            text: EMPTY_DOCUMENT_PLACEHOLDER.to_string(),
            oversized: false,
        }];
    }

    let mut pieces: Vec<(String, bool)> = Vec::new();
    let mut acc = String::new();
    let mut acc_len = 0usize;

    for paragraph in text.split(PARAGRAPH_SEPARATOR).map(str::trim).filter(|p| !p.is_empty()) {
        let p_len = char_len(paragraph);

        if p_len > max_chars {
            if !acc.is_empty() {
                pieces.push((std::mem::take(&mut acc), false));
            }
            acc_len = 0;
            debug!(
                "Paragraph of {} chars exceeds budget {}; splitting by sentence",
                p_len, max_chars
            );
            pieces.extend(split_by_sentence(paragraph, max_chars, policy));
            continue;
        }

        if acc.is_empty() {
            acc.push_str(paragraph);
            acc_len = p_len;
        } else if acc_len + p_len + PARAGRAPH_SEPARATOR_LEN > max_chars {
            pieces.push((std::mem::replace(&mut acc, paragraph.to_string()), false));
            acc_len = p_len;
        } else {
            acc.push_str(PARAGRAPH_SEPARATOR);
            acc.push_str(paragraph);
            acc_len += PARAGRAPH_SEPARATOR_LEN + p_len;
        }
    }
    if !acc.is_empty() {
        pieces.push((acc, false));
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, (text, oversized))| NarrationSegment {
            index,
            text,
            oversized,
        })
        .collect()
}

/// Split on sentence ends, keeping the punctuation with its sentence.
pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in RE_SENTENCE_END.find_iter(paragraph) {
        // Punctuation is one byte; whitespace after it is dropped.
        sentences.push(&paragraph[start..m.start() + 1]);
        start = m.end();
    }
    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }
    sentences
}

/// Pack the sentences of an oversized paragraph under the budget.
fn split_by_sentence(paragraph: &str, max_chars: usize, policy: OversizePolicy) -> Vec<(String, bool)> {
    let mut packed: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for sentence in split_sentences(paragraph) {
        let s_len = char_len(sentence);
        if cur.is_empty() {
            cur.push_str(sentence);
            cur_len = s_len;
        } else if cur_len + s_len + SENTENCE_SEPARATOR_LEN > max_chars {
            packed.push(std::mem::replace(&mut cur, sentence.to_string()));
            cur_len = s_len;
        } else {
            cur.push(' ');
            cur.push_str(sentence);
            cur_len += SENTENCE_SEPARATOR_LEN + s_len;
        }
    }
    if !cur.is_empty() {
        packed.push(cur);
    }

    packed
        .into_iter()
        .map(|piece| {
            let len = char_len(&piece);
            if len <= max_chars {
                return (piece, false);
            }
            match policy {
                OversizePolicy::PassThrough => {
                    warn!(
                        "Single sentence of {} chars exceeds budget {}; passing it through whole",
                        len, max_chars
                    );
                    (piece, true)
                }
                OversizePolicy::Truncate => {
                    warn!(
                        "Single sentence of {} chars exceeds budget {}; truncating",
                        len, max_chars
                    );
                    (truncate_chars(&piece, max_chars).to_string(), true)
                }
            }
        })
        .collect()
}
