//! Prompts sent to the text and vision collaborators.
//!
//! Every string the pipeline hands to a generative model lives here, so a
//! prompt change is a one-file diff and tests can inspect the exact wording.
//! The models are only ever asked for content; control flow (which extractor
//! runs, which image goes where) never depends on generated text.

/// Context handed to the image describer when neither the block nor its
/// neighbours produced a summary.
pub const NO_CONTEXT_PLACEHOLDER: &str = "No readable text in nearby pages.";

/// System message for summaries.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarise document passages for an audio narration. \
Reply with a single plain sentence. No lists, no markdown, no preamble.";

/// Build the user prompt asking for a one-line summary.
pub fn summary_prompt(text: &str) -> String {
    format!("Provide a brief one-line summary of this:\n{text}")
}

/// System message for image descriptions.
pub const DESCRIPTION_SYSTEM_PROMPT: &str = "You describe images for listeners who cannot see them. \
Reply with exactly one natural sentence in plain text.";

/// Build the instruction accompanying an image.
///
/// The summary steers the description but must not be quoted or mentioned.
pub fn image_description_prompt(context_summary: &str) -> String {
    format!(
        "Write one concise, natural sentence describing the image. \
If it clearly connects to the given summary, include that meaningfully. \
Only describe what is visually present. Do not reference the text or summary directly.\n\n\
Summary (for context): {context_summary}\n"
    )
}

/// System prompt for the OCR fallback on pages without a text layer.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe all readable text on the page image exactly as written.

Rules:
1. Keep the reading order a human would follow.
2. Separate paragraphs with a blank line.
3. Skip page numbers and repeated running headers or footers.
4. Output plain text only: no markdown, no commentary, no code fences.
5. If the page has no readable text, output nothing."#;
