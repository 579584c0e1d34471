//! Text cleaning & structuring: raw enrichment stream → narration-ready text.
//!
//! The raw stream mixes extracted text (often hard-wrapped, with stray
//! control characters) with section lines and image descriptions. This stage
//! is a pure `&str → String` transform with no external calls.
//!
//! ## Output shape
//!
//! ```text
//! # Section title
//!
//! First paragraph on one line.
//!
//! Second paragraph.
//!
//! --- END OF SECTION ---
//!
//! # Next section
//! ```
//!
//! Pieces are separated by exactly one blank line, which is the delimiter
//! the chunker splits on.

use once_cell::sync::Lazy;
use regex::Regex;

/// Line appended when a section (or the trailing run of paragraphs) closes.
pub const END_OF_SECTION: &str = "--- END OF SECTION ---";

/// Clean and structure a raw text stream.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Collapse whitespace runs inside each line and trim it
/// 4. Coalesce lines into paragraphs and insert section boundaries
///
/// Running it again on its own output returns the output unchanged.
pub fn clean_text(raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let s = remove_invisible_chars(&s);
    let s = collapse_inline_whitespace(&s);
    structure_sections(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse inline whitespace ───────────────────────────────────────

fn collapse_inline_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Paragraphs and section boundaries ───────────────────────────────

static RE_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s+\S").unwrap());

/// Whether `line` opens a new section.
pub fn is_section_marker(line: &str) -> bool {
    RE_SECTION.is_match(line.trim())
}

/// Paragraph/section state machine.
///
/// `section_active` tracks whether a `#` section is open; `dangling` tracks
/// whether anything has been emitted since the last end marker. A header
/// closes the previous section, an end-marker line in the input closes
/// whatever is dangling, and the stream end closes the rest.
#[derive(Default)]
struct Structurer<'a> {
    out: Vec<String>,
    paragraph: Vec<&'a str>,
    section_active: bool,
    dangling: bool,
}

impl<'a> Structurer<'a> {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            self.out.push(self.paragraph.join(" "));
            self.paragraph.clear();
            self.dangling = true;
        }
    }

    fn close(&mut self) {
        if self.dangling {
            self.out.push(END_OF_SECTION.to_string());
        }
        self.section_active = false;
        self.dangling = false;
    }

    fn line(&mut self, line: &'a str) {
        if line.is_empty() {
            self.flush_paragraph();
        } else if line == END_OF_SECTION {
            self.flush_paragraph();
            self.close();
        } else if is_section_marker(line) {
            self.flush_paragraph();
            if self.section_active {
                self.close();
            }
            self.out.push(line.to_string());
            self.section_active = true;
            self.dangling = true;
        } else {
            self.paragraph.push(line);
        }
    }

    fn finish(mut self) -> String {
        self.flush_paragraph();
        self.close();
        self.out.join("\n\n")
    }
}

fn structure_sections(input: &str) -> String {
    let mut s = Structurer::default();
    for line in input.lines() {
        s.line(line.trim());
    }
    s.finish()
}
