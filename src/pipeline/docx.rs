//! Word (`.docx`) extraction.
//!
//! A `.docx` file is a ZIP package. Three parts matter here:
//!
//! | Part | Used for |
//! |------|----------|
//! | `word/document.xml` | paragraphs, run text, paragraph styles, drawing references |
//! | `word/_rels/document.xml.rels` | relationship id → media part path |
//! | `word/media/*` | the image pool |
//!
//! Every `w:p` becomes one [`ContentBlock`] in document order. Paragraphs
//! nested inside text boxes are folded into their enclosing paragraph so the
//! block sequence still follows the body's reading order. Only the
//! `mc:Choice` branch of markup-compatibility content is read.

use crate::config::ImageAttribution;
use crate::document::{BlockStyle, ContentBlock, ImageRef};
use crate::error::NarratorError;
use crate::pipeline::encode::sniff_mime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";
const MEDIA_PREFIX: &str = "word/media/";

#[derive(Debug, Error)]
enum DocxError {
    #[error("invalid ZIP package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing part {0}")]
    MissingPart(&'static str),
}

/// Extract blocks from the `.docx` at `path`.
///
/// Blocking: call from `spawn_blocking` in async contexts.
pub fn extract_docx(
    path: &Path,
    attribution: ImageAttribution,
) -> Result<Vec<ContentBlock>, NarratorError> {
    let unreadable = |detail: String| NarratorError::DocumentUnreadable {
        path: path.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let blocks = extract_from_reader(file, attribution).map_err(|e| unreadable(e.to_string()))?;

    info!(
        "DOCX extracted: {} paragraphs, {} with images",
        blocks.len(),
        blocks.iter().filter(|b| !b.images.is_empty()).count()
    );
    Ok(blocks)
}

fn extract_from_reader<R: Read + Seek>(
    reader: R,
    attribution: ImageAttribution,
) -> Result<Vec<ContentBlock>, DocxError> {
    let mut archive = zip::ZipArchive::new(reader)?;

    let document_xml = match read_part(&mut archive, DOCUMENT_PART)? {
        Some(xml) => xml,
        None => return Err(DocxError::MissingPart(DOCUMENT_PART)),
    };
    let paragraphs = parse_document(&document_xml)?;

    let relationships = match read_part(&mut archive, RELS_PART)? {
        Some(xml) => Some(parse_relationships(&xml)?),
        None => None,
    };
    let pool = read_media_pool(&mut archive)?;
    debug!(
        "DOCX package: {} relationships, {} media parts",
        relationships.as_ref().map_or(0, HashMap::len),
        pool.len()
    );

    Ok(attribute_images(
        paragraphs,
        relationships.as_ref(),
        &pool,
        attribution,
    ))
}

// ── Image attribution ────────────────────────────────────────────────────

/// Attach candidate images to flagged paragraphs.
///
/// Under `Placement` a paragraph keeps only the pictures its own ids resolve
/// to. The shared pool is used when the package has no relationships part,
/// or when the paragraph names ids that resolve to nothing. A flagged
/// paragraph without ids (chart, shape, text box) gets no image.
fn attribute_images(
    paragraphs: Vec<ParsedParagraph>,
    relationships: Option<&HashMap<String, String>>,
    pool: &[(String, ImageRef)],
    attribution: ImageAttribution,
) -> Vec<ContentBlock> {
    let shared: Vec<ImageRef> = pool.iter().map(|(_, img)| img.clone()).collect();

    paragraphs
        .into_iter()
        .map(|p| {
            let images = if !p.has_graphic {
                Vec::new()
            } else {
                match (attribution, relationships) {
                    (ImageAttribution::SharedPool, _) | (ImageAttribution::Placement, None) => {
                        shared.clone()
                    }
                    (ImageAttribution::Placement, Some(_)) if p.embed_ids.is_empty() => Vec::new(),
                    (ImageAttribution::Placement, Some(relationships)) => {
                        let placed: Vec<ImageRef> = p
                            .embed_ids
                            .iter()
                            .filter_map(|id| relationships.get(id))
                            .filter_map(|target| {
                                pool.iter()
                                    .find(|(part, _)| part == target)
                                    .map(|(_, img)| img.clone())
                            })
                            .collect();
                        if placed.is_empty() {
                            shared.clone()
                        } else {
                            placed
                        }
                    }
                }
            };
            ContentBlock::new(p.text, p.style).with_images(images)
        })
        .collect()
}

// ── Package access ───────────────────────────────────────────────────────

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, DocxError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            Ok(Some(String::from_utf8_lossy(strip_bom(&contents)).into_owned()))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All `word/media/*` parts in archive order, keyed by part path.
fn read_media_pool<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<(String, ImageRef)>, DocxError> {
    let mut pool = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        let Some(basename) = name.strip_prefix(MEDIA_PREFIX) else {
            continue;
        };
        if basename.is_empty() || basename.starts_with('.') || file.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let image = ImageRef {
            id: basename.to_string(),
            mime_type: sniff_mime(&data),
            data,
        };
        pool.push((name, image));
    }
    Ok(pool)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Extract local name from a namespaced XML name (`w:p` → `p`).
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn attr_value(e: &BytesStart<'_>, wanted: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == wanted)
        .map(|attr| String::from_utf8_lossy(attr.value.as_ref()).into_owned())
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "apos" => Some('\''),
        "quot" => Some('"'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        num => {
            let code = num.strip_prefix('#')?;
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

// ── Relationships ────────────────────────────────────────────────────────

/// Map image relationship ids to normalised part paths (`rId5` → `word/media/image1.png`).
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, DocxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut map = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"Relationship" => {
                let id = attr_value(&e, b"Id");
                let kind = attr_value(&e, b"Type").unwrap_or_default();
                let target = attr_value(&e, b"Target");
                let external = attr_value(&e, b"TargetMode").as_deref() == Some("External");
                if let (Some(id), Some(target)) = (id, target) {
                    if kind.ends_with("/image") && !external {
                        map.insert(id, resolve_target(&target));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(map)
}

/// Resolve a relationship target against the `word/` directory.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = vec!["word"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

// ── document.xml ─────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct ParsedParagraph {
    text: String,
    style: BlockStyle,
    has_graphic: bool,
    embed_ids: Vec<String>,
}

fn parse_document(xml: &str) -> Result<Vec<ParsedParagraph>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();

    let mut current = ParsedParagraph::default();
    let mut depth = 0usize;
    let mut in_text = false;
    let mut in_properties = false;
    // `mc:Fallback` repeats its `mc:Choice` sibling for older readers.
    let mut fallback_depth = 0usize;

    loop {
        let event = reader.read_event()?;
        if fallback_depth > 0 {
            match &event {
                Event::Start(e) if local_name(e.name().as_ref()) == b"Fallback" => {
                    fallback_depth += 1
                }
                Event::End(e) if local_name(e.name().as_ref()) == b"Fallback" => {
                    fallback_depth -= 1
                }
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"Fallback" => fallback_depth = 1,
                b"p" => {
                    if depth > 0 {
                        current.text.push(' ');
                    }
                    depth += 1;
                }
                b"pPr" if depth == 1 => in_properties = true,
                b"t" if depth > 0 => in_text = true,
                other if depth > 0 => current.observe(other, &e, in_properties),
                _ => {}
            },
            Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"p" if depth == 0 => paragraphs.push(ParsedParagraph::default()),
                other if depth > 0 => current.observe(other, &e, in_properties),
                _ => {}
            },
            Event::Text(e) if in_text => {
                current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(e) if in_text => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(c) = resolve_entity(&entity) {
                    current.text.push(c);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"pPr" => in_properties = false,
                b"p" if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        let mut done = std::mem::take(&mut current);
                        done.text = done.text.split_whitespace().collect::<Vec<_>>().join(" ");
                        paragraphs.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

impl ParsedParagraph {
    /// Record a start or empty element seen inside the paragraph.
    fn observe(&mut self, local: &[u8], e: &BytesStart<'_>, in_properties: bool) {
        match local {
            b"pStyle" if in_properties => {
                if let Some(val) = attr_value(e, b"val") {
                    self.style = BlockStyle::from_word_style(&val);
                }
            }
            // Tab-stop definitions also use `w:tab` inside `w:pPr`.
            b"tab" | b"br" | b"cr" if !in_properties => self.text.push(' '),
            b"graphicData" | b"drawing" | b"pict" => self.has_graphic = true,
            b"blip" => {
                self.has_graphic = true;
                if let Some(id) = attr_value(e, b"embed") {
                    self.embed_ids.push(id);
                }
            }
            b"imagedata" => {
                self.has_graphic = true;
                if let Some(id) = attr_value(e, b"id") {
                    self.embed_ids.push(id);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub(crate) const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
        0xCF, 0xC0, 0xF0, 0x1F, 0x00, 0x05, 0x00, 0x01, 0xFF, 0x89, 0x99, 0x3D, 0x1D, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    const W_NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    /// Wrap `body` paragraphs in a minimal `document.xml`.
    pub(crate) fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {W_NS}><w:body>{body}</w:body></w:document>"#
        )
    }

    pub(crate) fn drawing(r_id: &str) -> String {
        format!(
            r#"<w:r><w:drawing><a:graphic><a:graphicData><a:blip r:embed="{r_id}"/></a:graphicData></a:graphic></w:drawing></w:r>"#
        )
    }

    pub(crate) fn rels_xml(entries: &[(&str, &str)]) -> String {
        let mut out = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (id, target) in entries {
            out.push_str(&format!(
                r#"<Relationship Id="{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{target}"/>"#
            ));
        }
        out.push_str("</Relationships>");
        out
    }

    /// Build a `.docx` package in memory.
    pub(crate) fn build_docx(document: &str, rels: Option<&str>, media: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file("word/document.xml", stored).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        if let Some(rels) = rels {
            zip.start_file("word/_rels/document.xml.rels", stored).unwrap();
            zip.write_all(rels.as_bytes()).unwrap();
        }
        for (name, bytes) in media {
            zip.start_file(format!("word/media/{name}"), stored).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn para(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
            .unwrap_or_default();
        format!(r#"<w:p>{ppr}<w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    #[test]
    fn paragraphs_styles_and_order() {
        let xml = document_xml(&format!(
            "{}{}{}",
            para(Some("Title"), "My Book"),
            para(Some("Heading1"), "Chapter One"),
            para(None, "It was a dark night.")
        ));
        let paras = parse_document(&xml).unwrap();
        let got: Vec<(&str, BlockStyle)> = paras.iter().map(|p| (p.text.as_str(), p.style)).collect();
        assert_eq!(
            got,
            vec![
                ("My Book", BlockStyle::Title),
                ("Chapter One", BlockStyle::Heading(1)),
                ("It was a dark night.", BlockStyle::Body),
            ]
        );
    }

    #[test]
    fn runs_tabs_and_entities() {
        let xml = document_xml(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Fish</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve">&amp; chips </w:t></w:r><w:r><w:br/><w:t>&#8364;5</w:t></w:r></w:p><w:p/>"#,
        );
        let paras = parse_document(&xml).unwrap();
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].text, "Fish & chips €5");
        assert_eq!(paras[1].text, "");
    }

    #[test]
    fn drawing_flags_and_embed_ids() {
        let xml = document_xml(&format!(
            r#"<w:p><w:r><w:t>Look:</w:t></w:r>{}</w:p>"#,
            drawing("rId7")
        ));
        let paras = parse_document(&xml).unwrap();
        assert!(paras[0].has_graphic);
        assert_eq!(paras[0].embed_ids, vec!["rId7".to_string()]);
    }

    #[test]
    fn relationship_targets_resolve_to_parts() {
        let rels = rels_xml(&[("rId1", "media/image1.png"), ("rId2", "../word/media/x.png")]);
        let map = parse_relationships(&rels).unwrap();
        assert_eq!(map["rId1"], "word/media/image1.png");
        assert_eq!(map["rId2"], "word/media/x.png");
        assert_eq!(resolve_target("/word/media/a.png"), "word/media/a.png");
    }

    #[test]
    fn placement_uses_each_drawings_own_image() {
        let xml = document_xml(&format!(
            "<w:p>{}</w:p>{}<w:p>{}</w:p>",
            drawing("rId2"),
            para(None, "plain"),
            drawing("rId1")
        ));
        let rels = rels_xml(&[("rId1", "media/image1.png"), ("rId2", "media/image2.png")]);
        let pkg = build_docx(
            &xml,
            Some(&rels),
            &[("image1.png", PNG_1X1), ("image2.png", PNG_1X1)],
        );

        let blocks = extract_from_reader(Cursor::new(pkg), ImageAttribution::Placement).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].images.len(), 1);
        assert_eq!(blocks[0].images[0].id, "image2.png");
        assert!(blocks[1].images.is_empty());
        assert_eq!(blocks[2].images[0].id, "image1.png");
        assert_eq!(blocks[2].images[0].mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn shared_pool_gives_every_flagged_block_all_images() {
        let xml = document_xml(&format!(
            "<w:p>{}</w:p><w:p>{}</w:p>{}",
            drawing("rId2"),
            drawing("rId1"),
            para(None, "no picture")
        ));
        let rels = rels_xml(&[("rId1", "media/image1.png"), ("rId2", "media/image2.png")]);
        let pkg = build_docx(
            &xml,
            Some(&rels),
            &[("image1.png", PNG_1X1), ("image2.png", PNG_1X1)],
        );

        let blocks = extract_from_reader(Cursor::new(pkg), ImageAttribution::SharedPool).unwrap();
        let ids: Vec<&str> = blocks[0].images.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["image1.png", "image2.png"]);
        assert_eq!(blocks[1].images.len(), 2);
        assert!(blocks[2].images.is_empty());
    }

    #[test]
    fn placement_gives_charts_and_shapes_no_picture() {
        let chart = r#"<w:p><w:r><w:t>Chart here</w:t></w:r><w:r><w:drawing><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="rId5"/></a:graphicData></a:graphic></w:drawing></w:r></w:p>"#;
        let xml = document_xml(&format!("<w:p>{}</w:p>{}", drawing("rId1"), chart));
        let rels = rels_xml(&[("rId1", "media/image1.png")]);
        let pkg = build_docx(&xml, Some(&rels), &[("image1.png", PNG_1X1)]);

        let blocks = extract_from_reader(Cursor::new(pkg), ImageAttribution::Placement).unwrap();
        assert_eq!(blocks[0].images[0].id, "image1.png");
        assert_eq!(blocks[1].text, "Chart here");
        assert!(blocks[1].images.is_empty());
    }

    #[test]
    fn placement_falls_back_to_pool_for_unresolved_ids() {
        let xml = document_xml(&format!("<w:p>{}</w:p>", drawing("rId404")));
        let rels = rels_xml(&[("rId1", "media/image1.png")]);
        let pkg = build_docx(&xml, Some(&rels), &[("image1.png", PNG_1X1)]);
        let blocks = extract_from_reader(Cursor::new(pkg), ImageAttribution::Placement).unwrap();
        assert_eq!(blocks[0].images.len(), 1);
    }

    #[test]
    fn text_box_fallback_copy_is_skipped() {
        let xml = document_xml(
            r#"<w:p><w:r><w:t>Outer</w:t></w:r><w:r><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><mc:Choice Requires="wps"><w:drawing><a:graphic><a:graphicData><wps:wsp xmlns:wps="http://schemas.microsoft.com/office/word/2010/wordprocessingShape"><wps:txbx><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></wps:txbx></wps:wsp></a:graphicData></a:graphic></w:drawing></mc:Choice><mc:Fallback><w:pict><v:rect xmlns:v="urn:schemas-microsoft-com:vml"><v:textbox><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></v:textbox></v:rect></w:pict></mc:Fallback></mc:AlternateContent></w:r></w:p><w:p><w:r><w:t>Next</w:t></w:r></w:p>"#,
        );
        let paras = parse_document(&xml).unwrap();
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].text, "Outer Boxed");
        assert!(paras[0].embed_ids.is_empty());
        assert_eq!(paras[1].text, "Next");
    }

    #[test]
    fn placement_falls_back_to_pool_without_rels() {
        let xml = document_xml(&format!("<w:p>{}</w:p>", drawing("rId9")));
        let pkg = build_docx(&xml, None, &[("image1.png", PNG_1X1)]);
        let blocks = extract_from_reader(Cursor::new(pkg), ImageAttribution::Placement).unwrap();
        assert_eq!(blocks[0].images.len(), 1);
    }

    #[test]
    fn missing_document_part_is_an_error() {
        let pkg = build_docx("", None, &[]);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default()).unwrap();
        let empty = zip.finish().unwrap().into_inner();
        assert!(extract_from_reader(Cursor::new(pkg), ImageAttribution::Placement).is_ok());
        assert!(matches!(
            extract_from_reader(Cursor::new(empty), ImageAttribution::Placement),
            Err(DocxError::MissingPart(_))
        ));
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let r = extract_from_reader(Cursor::new(b"garbage".to_vec()), ImageAttribution::Placement);
        assert!(matches!(r, Err(DocxError::Zip(_))));
    }
}
