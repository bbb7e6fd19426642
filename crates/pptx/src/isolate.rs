//! Single-slide copies of a package.
//!
//! The per-slide rendering fallback converts one slide at a time; each copy
//! keeps every part of the original except the other slides and their notes,
//! so layouts, masters, themes and media stay intact.

use crate::package::{
    rel_types, rels_path_for, resolve_target, PptxPackage, CONTENT_TYPES_PART, PRESENTATION_PART,
};
use crate::writer::write_zip;
use deck_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;

/// Build a `.pptx` containing only slide `slide_number` (1-based).
pub fn isolate_slide(package: &PptxPackage, slide_number: usize) -> Result<Vec<u8>> {
    let slides = package.slide_parts()?;
    if slide_number == 0 || slide_number > slides.len() {
        return Err(Error::Validation(format!(
            "Slide {} out of range (deck has {})",
            slide_number,
            slides.len()
        )));
    }

    let dropped_slides: HashSet<&str> = slides
        .iter()
        .enumerate()
        .filter(|(idx, _)| idx + 1 != slide_number)
        .map(|(_, part)| part.as_str())
        .collect();

    let dropped_rel_ids: HashSet<String> = package
        .relationships(PRESENTATION_PART)?
        .into_iter()
        .filter(|r| {
            !r.external
                && dropped_slides.contains(resolve_target(PRESENTATION_PART, &r.target).as_str())
        })
        .map(|r| r.id)
        .collect();

    // Notes slides point back at their slide and go with it.
    let mut dropped: HashSet<String> = HashSet::new();
    for slide in &dropped_slides {
        for rel in package.relationships(slide)? {
            if !rel.external && rel.is_type(rel_types::NOTES_SLIDE) {
                dropped.insert(resolve_target(slide, &rel.target));
            }
        }
        dropped.insert(slide.to_string());
    }

    let dropped_rels: HashSet<String> = dropped.iter().map(|p| rels_path_for(p)).collect();
    let dropped_part_names: HashSet<String> =
        dropped.iter().map(|p| format!("/{}", p)).collect();

    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for (name, data) in package.parts() {
        if dropped.contains(name) || dropped_rels.contains(name) {
            continue;
        }

        let data = if name == PRESENTATION_PART {
            filter_elements(data, |e| {
                !(local(e) == b"sldId"
                    && attr(e, b"r:id").is_some_and(|id| dropped_rel_ids.contains(&id)))
            })?
        } else if name == &rels_path_for(PRESENTATION_PART) {
            filter_elements(data, |e| {
                !(local(e) == b"Relationship"
                    && attr(e, b"Id").is_some_and(|id| dropped_rel_ids.contains(&id)))
            })?
        } else if name == CONTENT_TYPES_PART {
            filter_elements(data, |e| {
                !(local(e) == b"Override"
                    && attr(e, b"PartName").is_some_and(|p| dropped_part_names.contains(&p)))
            })?
        } else {
            data.clone()
        };
        parts.insert(name.clone(), data);
    }

    log::debug!(
        "Isolated slide {} ({} other slide(s) removed)",
        slide_number,
        dropped_slides.len()
    );

    let mut buffer = Cursor::new(Vec::new());
    write_zip(&parts, &mut buffer)?;
    Ok(buffer.into_inner())
}

fn local<'a>(e: &'a BytesStart<'_>) -> &'a [u8] {
    let name = e.name().into_inner();
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Copy an XML document, dropping every element (and its subtree) for which
/// `keep` returns false.
fn filter_elements<F>(xml: &[u8], keep: F) -> Result<Vec<u8>>
where
    F: Fn(&BytesStart<'_>) -> bool,
{
    let text = std::str::from_utf8(xml)
        .map_err(|e| Error::CorruptedFile(format!("XML part is not UTF-8: {}", e)))?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut skip_depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::XmlError(format!("Error filtering XML: {}", e)))?;
        match &event {
            Event::Eof => break,
            Event::Start(e) => {
                if skip_depth > 0 || !keep(e) {
                    skip_depth += 1;
                    continue;
                }
            }
            Event::End(_) if skip_depth > 0 => {
                skip_depth -= 1;
                continue;
            }
            Event::Empty(e) => {
                if skip_depth > 0 || !keep(e) {
                    continue;
                }
            }
            _ if skip_depth > 0 => continue,
            _ => {}
        }
        writer
            .write_event(event)
            .map_err(|e| Error::XmlError(format!("Error writing XML: {}", e)))?;
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::DeckWriter;
    use deck_core::SlideSize;

    const NOTES_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
    const NOTES_TYPE: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";

    /// Three-slide deck where every slide has a notes slide.
    fn deck_with_notes() -> PptxPackage {
        let mut writer = DeckWriter::new(SlideSize::new(9_144_000, 6_858_000));
        for _ in 0..3 {
            writer.add_slide();
        }
        let mut parts = writer.parts();
        let mut overrides = String::new();
        for n in 1..=3 {
            let slide_rels = format!("ppt/slides/_rels/slide{}.xml.rels", n);
            let rels = String::from_utf8(parts[&slide_rels].clone()).unwrap().replace(
                "</Relationships>",
                &format!(
                    r#"<Relationship Id="rId99" Type="{}" Target="../notesSlides/notesSlide{}.xml"/></Relationships>"#,
                    NOTES_REL, n
                ),
            );
            parts.insert(slide_rels, rels.into_bytes());
            parts.insert(
                format!("ppt/notesSlides/notesSlide{}.xml", n),
                br#"<p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#
                    .to_vec(),
            );
            parts.insert(
                format!("ppt/notesSlides/_rels/notesSlide{}.xml.rels", n),
                format!(
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="../slides/slide{}.xml"/></Relationships>"#,
                    n
                )
                .into_bytes(),
            );
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/notesSlides/notesSlide{}.xml" ContentType="{}"/>"#,
                n, NOTES_TYPE
            ));
        }
        let types = String::from_utf8(parts[CONTENT_TYPES_PART].clone())
            .unwrap()
            .replace("</Types>", &format!("{}</Types>", overrides));
        parts.insert(CONTENT_TYPES_PART.to_string(), types.into_bytes());

        let mut buffer = Cursor::new(Vec::new());
        write_zip(&parts, &mut buffer).unwrap();
        buffer.set_position(0);
        PptxPackage::from_reader(buffer).unwrap()
    }

    #[test]
    fn test_isolated_slide_drops_other_notes() {
        let package = deck_with_notes();
        let bytes = isolate_slide(&package, 2).unwrap();
        let isolated = PptxPackage::from_reader(Cursor::new(bytes)).unwrap();

        assert_eq!(isolated.slide_parts().unwrap(), vec!["ppt/slides/slide2.xml"]);
        assert!(isolated.has_part("ppt/notesSlides/notesSlide2.xml"));
        assert!(isolated.has_part("ppt/notesSlides/_rels/notesSlide2.xml.rels"));
        for n in [1, 3] {
            assert!(!isolated.has_part(&format!("ppt/slides/slide{}.xml", n)));
            assert!(!isolated.has_part(&format!("ppt/notesSlides/notesSlide{}.xml", n)));
            assert!(!isolated.has_part(&format!("ppt/notesSlides/_rels/notesSlide{}.xml.rels", n)));
        }

        let types = isolated.part_string(CONTENT_TYPES_PART).unwrap();
        assert!(types.contains("/ppt/notesSlides/notesSlide2.xml"));
        assert!(!types.contains("/ppt/notesSlides/notesSlide1.xml"));
        assert!(!types.contains("/ppt/slides/slide3.xml"));
    }

    #[test]
    fn test_slide_out_of_range() {
        let package = deck_with_notes();
        assert!(matches!(isolate_slide(&package, 0), Err(Error::Validation(_))));
        assert!(matches!(isolate_slide(&package, 4), Err(Error::Validation(_))));
    }

    #[test]
    fn test_filter_elements_drops_subtrees() {
        let xml = br#"<root><keep a="1"/><drop><inner/></drop><drop/><keep>t</keep></root>"#;
        let out = filter_elements(xml, |e| local(e) != b"drop").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<root><keep a="1"/><keep>t</keep></root>"#
        );
    }

    #[test]
    fn test_filter_by_attribute() {
        let xml = br#"<p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst>"#;
        let out = filter_elements(xml, |e| {
            !(local(e) == b"sldId" && attr(e, b"r:id").as_deref() == Some("rId2"))
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<p:sldIdLst><p:sldId id="257" r:id="rId3"/></p:sldIdLst>"#
        );
    }
}
