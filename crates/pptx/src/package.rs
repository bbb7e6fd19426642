//! PPTX package access: parts, relationships, slide order and slide size.

use crate::xml::XmlElement;
use deck_core::{Error, Result, SlideSize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Path of the main presentation part.
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Path of the content types part.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Relationship type suffixes used throughout the crate.
pub mod rel_types {
    pub const SLIDE: &str = "slide";
    pub const SLIDE_LAYOUT: &str = "slideLayout";
    pub const SLIDE_MASTER: &str = "slideMaster";
    pub const THEME: &str = "theme";
    pub const IMAGE: &str = "image";
    pub const OLE_OBJECT: &str = "oleObject";
    pub const PACKAGE: &str = "package";
    pub const NOTES_SLIDE: &str = "notesSlide";
}

/// One entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Whether the relationship type ends with `/<suffix>`.
    pub fn is_type(&self, suffix: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .map(|last| last == suffix)
            .unwrap_or(false)
    }
}

/// An opened `.pptx` package with all parts held in memory.
#[derive(Debug, Clone)]
pub struct PptxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl PptxPackage {
    /// Open a `.pptx` file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        ensure_pptx_extension(path)?;

        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a package from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;
            parts.insert(name, data);
        }

        if !parts.contains_key(PRESENTATION_PART) {
            return Err(Error::CorruptedFile(format!(
                "Package has no {}",
                PRESENTATION_PART
            )));
        }

        log::debug!("Opened package with {} parts", parts.len());
        Ok(Self { parts })
    }

    /// All part names in sorted order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn parts(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.parts
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Raw bytes of a part.
    pub fn part_bytes(&self, name: &str) -> Result<&[u8]> {
        self.parts
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::CorruptedFile(format!("Part not found in package: {}", name)))
    }

    /// A part decoded as UTF-8.
    pub fn part_string(&self, name: &str) -> Result<String> {
        let bytes = self.part_bytes(name)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::CorruptedFile(format!("Part '{}' is not UTF-8: {}", name, e)))
    }

    /// A part parsed into an element tree.
    pub fn part_xml(&self, name: &str) -> Result<XmlElement> {
        let content = self.part_string(name)?;
        XmlElement::parse(&content)
            .map_err(|e| Error::XmlError(format!("Error parsing {}: {}", name, e)))
    }

    /// Relationships owned by a part; empty when it has no `.rels` part.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>> {
        let rels_path = rels_path_for(part);
        if !self.has_part(&rels_path) {
            return Ok(Vec::new());
        }

        let root = self.part_xml(&rels_path)?;
        Ok(root
            .children_named("Relationship")
            .map(|e| Relationship {
                id: e.attr("Id").unwrap_or_default().to_string(),
                rel_type: e.attr("Type").unwrap_or_default().to_string(),
                target: e.attr("Target").unwrap_or_default().to_string(),
                external: e.attr("TargetMode") == Some("External"),
            })
            .collect())
    }

    /// Resolve a relationship id of `part` to the target part name.
    pub fn resolve_rel(&self, part: &str, rel_id: &str) -> Result<Option<String>> {
        Ok(self
            .relationships(part)?
            .into_iter()
            .find(|r| r.id == rel_id && !r.external)
            .map(|r| resolve_target(part, &r.target)))
    }

    /// First internal target of `part` with the given relationship type.
    pub fn related_part(&self, part: &str, rel_type: &str) -> Result<Option<String>> {
        Ok(self
            .relationships(part)?
            .into_iter()
            .find(|r| r.is_type(rel_type) && !r.external)
            .map(|r| resolve_target(part, &r.target)))
    }

    /// Slide part names in presentation order.
    pub fn slide_parts(&self) -> Result<Vec<String>> {
        let presentation = self.part_xml(PRESENTATION_PART)?;
        let rels = self.relationships(PRESENTATION_PART)?;

        let listed: Vec<String> = presentation
            .child("sldIdLst")
            .map(|list| {
                list.children_named("sldId")
                    .filter_map(|id| id.attr("r:id"))
                    .filter_map(|rid| rels.iter().find(|r| r.id == rid))
                    .map(|r| resolve_target(PRESENTATION_PART, &r.target))
                    .filter(|p| self.has_part(p))
                    .collect()
            })
            .unwrap_or_default();

        if !listed.is_empty() {
            return Ok(listed);
        }

        // No slide id list: order slide relationships by their trailing number.
        let mut slides: Vec<(String, Option<usize>)> = rels
            .iter()
            .filter(|r| r.is_type(rel_types::SLIDE) && !r.external)
            .map(|r| {
                let order = extract_slide_number(&r.target).or_else(|| extract_slide_number(&r.id));
                (resolve_target(PRESENTATION_PART, &r.target), order)
            })
            .filter(|(p, _)| self.has_part(p))
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Slide canvas size; zero when `p:sldSz` is missing.
    pub fn slide_size(&self) -> Result<SlideSize> {
        let presentation = self.part_xml(PRESENTATION_PART)?;
        Ok(presentation
            .child("sldSz")
            .map(|sz| SlideSize::new(sz.attr_i64("cx").unwrap_or(0), sz.attr_i64("cy").unwrap_or(0)))
            .unwrap_or_default())
    }
}

/// Reject anything but `.pptx`.
pub fn ensure_pptx_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pptx") => Ok(()),
        Some(other) => Err(Error::UnsupportedFormat(format!(".{}", other))),
        None => Err(Error::UnsupportedFormat(format!(
            "{} has no file extension",
            path.display()
        ))),
    }
}

/// The `.rels` part belonging to `part`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Extract a slide number from a string like "rId2" or "slides/slide3.xml".
pub fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slides/slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(rels_path_for("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide2.xml"),
            "ppt/slides/slide2.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "/ppt/media/x.jpeg"),
            "ppt/media/x.jpeg"
        );
    }

    #[test]
    fn test_relationship_type_suffix() {
        let rel = Relationship {
            id: "rId1".into(),
            rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout"
                .into(),
            target: "../slideLayouts/slideLayout1.xml".into(),
            external: false,
        };
        assert!(rel.is_type(rel_types::SLIDE_LAYOUT));
        assert!(!rel.is_type(rel_types::SLIDE));
    }

    #[test]
    fn test_extension_check() {
        assert!(ensure_pptx_extension(Path::new("deck.PPTX")).is_ok());
        assert!(matches!(
            ensure_pptx_extension(Path::new("deck.key")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(ensure_pptx_extension(Path::new("deck")).is_err());
    }
}
