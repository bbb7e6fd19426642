//! Writing `.pptx` packages.
//!
//! [`DeckWriter`] produces a minimal deck skeleton: one blank layout, one
//! master, a default theme and one slide per call to [`DeckWriter::add_slide`],
//! with pictures placed at exact EMU rectangles.

use crate::media::content_hash;
use crate::package::CONTENT_TYPES_PART;
use crate::xml::escape;
use deck_core::{Error, FrameRect, Result, SlideSize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_DECL: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Write parts to a ZIP container, `[Content_Types].xml` first.
pub fn write_zip<W: Write + Seek>(parts: &BTreeMap<String, Vec<u8>>, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let ordered = parts
        .iter()
        .filter(|(name, _)| name.as_str() == CONTENT_TYPES_PART)
        .chain(parts.iter().filter(|(name, _)| name.as_str() != CONTENT_TYPES_PART));

    for (name, data) in ordered {
        zip.start_file(name.as_str(), options)
            .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", name, e)))?;
        zip.write_all(data)?;
    }

    zip.finish()
        .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
    Ok(())
}

/// Content type for an image extension (without the dot).
fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Picture {
    rect: FrameRect,
    media: usize,
}

#[derive(Debug, Clone)]
struct TextBox {
    rect: FrameRect,
    paragraphs: Vec<String>,
}

#[derive(Debug, Clone)]
enum SlideItem {
    Picture(Picture),
    TextBox(TextBox),
}

#[derive(Debug, Clone)]
struct Media {
    extension: String,
    data: Vec<u8>,
}

/// Builds a new deck from blank slides.
#[derive(Debug, Clone)]
pub struct DeckWriter {
    size: SlideSize,
    slides: Vec<Vec<SlideItem>>,
    media: Vec<Media>,
    media_by_hash: HashMap<String, usize>,
}

impl DeckWriter {
    /// Create a writer for slides of the given canvas size.
    pub fn new(size: SlideSize) -> Self {
        Self {
            size,
            slides: Vec::new(),
            media: Vec::new(),
            media_by_hash: HashMap::new(),
        }
    }

    /// Append a blank slide; returns its 1-based number.
    pub fn add_slide(&mut self) -> usize {
        self.slides.push(Vec::new());
        self.slides.len()
    }

    /// Place an image on a slide at an exact EMU rectangle.
    ///
    /// `extension` is the image format without the dot (`png`, `jpg`, ...).
    /// Identical bytes are stored once.
    pub fn add_picture(
        &mut self,
        slide: usize,
        rect: FrameRect,
        data: Vec<u8>,
        extension: &str,
    ) -> Result<()> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if image_content_type(&extension).is_none() {
            return Err(Error::UnsupportedFormat(format!("image type .{}", extension)));
        }
        self.slide_items(slide)?;

        let hash = content_hash(&data);
        let media = match self.media_by_hash.get(&hash) {
            Some(&idx) => idx,
            None => {
                self.media.push(Media { extension, data });
                let idx = self.media.len() - 1;
                self.media_by_hash.insert(hash, idx);
                idx
            }
        };

        self.slide_items(slide)?
            .push(SlideItem::Picture(Picture { rect, media }));
        Ok(())
    }

    /// Place a plain text box with one paragraph per entry.
    pub fn add_text_box(&mut self, slide: usize, rect: FrameRect, paragraphs: &[&str]) -> Result<()> {
        let paragraphs = paragraphs.iter().map(|p| p.to_string()).collect();
        self.slide_items(slide)?
            .push(SlideItem::TextBox(TextBox { rect, paragraphs }));
        Ok(())
    }

    fn slide_items(&mut self, slide: usize) -> Result<&mut Vec<SlideItem>> {
        let count = self.slides.len();
        slide
            .checked_sub(1)
            .and_then(|idx| self.slides.get_mut(idx))
            .ok_or_else(|| {
                Error::Validation(format!("Slide {} does not exist (deck has {})", slide, count))
            })
    }

    /// Write the package to a file, creating or truncating it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the package to any seekable writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        write_zip(&self.parts(), writer)
    }

    /// All parts of the package, keyed by part name.
    pub fn parts(&self) -> BTreeMap<String, Vec<u8>> {
        let mut parts = BTreeMap::new();
        let mut put = |name: &str, content: String| {
            parts.insert(name.to_string(), content.into_bytes());
        };

        put(CONTENT_TYPES_PART, self.content_types());
        put("_rels/.rels", package_rels());
        put("ppt/presentation.xml", self.presentation());
        put("ppt/_rels/presentation.xml.rels", self.presentation_rels());
        put("ppt/presProps.xml", pres_props());
        put("ppt/viewProps.xml", view_props());
        put("ppt/tableStyles.xml", table_styles());
        put("ppt/slideMasters/slideMaster1.xml", slide_master());
        put(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            relationships(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("rId2", "theme", "../theme/theme1.xml"),
            ]),
        );
        put("ppt/slideLayouts/slideLayout1.xml", slide_layout());
        put(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
        );
        put("ppt/theme/theme1.xml", theme());

        for (idx, items) in self.slides.iter().enumerate() {
            let number = idx + 1;
            let (xml, rels) = self.slide(items);
            put(&format!("ppt/slides/slide{}.xml", number), xml);
            put(&format!("ppt/slides/_rels/slide{}.xml.rels", number), rels);
        }

        for (idx, media) in self.media.iter().enumerate() {
            parts.insert(
                format!("ppt/media/{}", media_name(idx, &media.extension)),
                media.data.clone(),
            );
        }

        parts
    }

    fn content_types(&self) -> String {
        let mut xml = format!(
            r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
            XML_HEADER
        );

        let mut extensions: Vec<&str> = self.media.iter().map(|m| m.extension.as_str()).collect();
        extensions.sort_unstable();
        extensions.dedup();
        for ext in extensions {
            if let Some(content_type) = image_content_type(ext) {
                xml.push_str(&format!(
                    r#"<Default Extension="{}" ContentType="{}"/>"#,
                    ext, content_type
                ));
            }
        }

        let pml = "application/vnd.openxmlformats-officedocument.presentationml";
        let overrides = [
            ("/ppt/presentation.xml", format!("{}.presentation.main+xml", pml)),
            ("/ppt/presProps.xml", format!("{}.presProps+xml", pml)),
            ("/ppt/viewProps.xml", format!("{}.viewProps+xml", pml)),
            ("/ppt/tableStyles.xml", format!("{}.tableStyles+xml", pml)),
            ("/ppt/slideMasters/slideMaster1.xml", format!("{}.slideMaster+xml", pml)),
            ("/ppt/slideLayouts/slideLayout1.xml", format!("{}.slideLayout+xml", pml)),
            (
                "/ppt/theme/theme1.xml",
                "application/vnd.openxmlformats-officedocument.theme+xml".to_string(),
            ),
        ];
        for (part, content_type) in overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                part, content_type
            ));
        }
        for number in 1..=self.slides.len() {
            xml.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}.slide+xml"/>"#,
                number, pml
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation(&self) -> String {
        let slide_ids: String = (0..self.slides.len())
            .map(|idx| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + idx, 6 + idx))
            .collect();
        let slide_list = if slide_ids.is_empty() {
            String::new()
        } else {
            format!("<p:sldIdLst>{}</p:sldIdLst>", slide_ids)
        };
        format!(
            r#"{}<p:presentation {} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{}<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
            XML_HEADER, NS_DECL, slide_list, self.size.width, self.size.height
        )
    }

    fn presentation_rels(&self) -> String {
        let mut rels: Vec<(String, &str, String)> = vec![
            ("rId1".into(), "slideMaster", "slideMasters/slideMaster1.xml".into()),
            ("rId2".into(), "theme", "theme/theme1.xml".into()),
            ("rId3".into(), "presProps", "presProps.xml".into()),
            ("rId4".into(), "viewProps", "viewProps.xml".into()),
            ("rId5".into(), "tableStyles", "tableStyles.xml".into()),
        ];
        for idx in 0..self.slides.len() {
            rels.push((
                format!("rId{}", 6 + idx),
                "slide",
                format!("slides/slide{}.xml", idx + 1),
            ));
        }
        let borrowed: Vec<(&str, &str, &str)> = rels
            .iter()
            .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
            .collect();
        relationships(&borrowed)
    }

    fn slide(&self, items: &[SlideItem]) -> (String, String) {
        let mut shapes = String::new();
        let mut rels: Vec<(String, String)> = Vec::new();
        let mut media_rel: HashMap<usize, String> = HashMap::new();

        for (idx, item) in items.iter().enumerate() {
            let shape_id = idx + 2;
            match item {
                SlideItem::Picture(picture) => {
                    let rel_id = media_rel
                        .entry(picture.media)
                        .or_insert_with(|| {
                            let id = format!("rId{}", rels.len() + 2);
                            let media = &self.media[picture.media];
                            rels.push((
                                id.clone(),
                                format!("../media/{}", media_name(picture.media, &media.extension)),
                            ));
                            id
                        })
                        .clone();
                    shapes.push_str(&picture_xml(shape_id, &rel_id, picture.rect));
                }
                SlideItem::TextBox(text) => shapes.push_str(&text_box_xml(shape_id, text)),
            }
        }

        let xml = format!(
            r#"{}<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
            XML_HEADER, NS_DECL, shapes
        );

        let mut all: Vec<(&str, &str, &str)> =
            vec![("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")];
        all.extend(rels.iter().map(|(id, target)| (id.as_str(), "image", target.as_str())));
        (xml, relationships(&all))
    }
}

fn media_name(idx: usize, extension: &str) -> String {
    format!("image{}.{}", idx + 1, extension)
}

fn xfrm(rect: FrameRect) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        rect.x, rect.y, rect.cx, rect.cy
    )
}

fn picture_xml(shape_id: usize, rel_id: &str, rect: FrameRect) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        id = shape_id,
        rel = rel_id,
        xfrm = xfrm(rect)
    )
}

fn text_box_xml(shape_id: usize, text: &TextBox) -> String {
    let paragraphs: String = text
        .paragraphs
        .iter()
        .map(|p| {
            format!(
                r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                escape(p)
            )
        })
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        id = shape_id,
        xfrm = xfrm(text.rect),
        paragraphs = paragraphs
    )
}

fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let body: String = rels
        .iter()
        .map(|(id, kind, target)| {
            format!(
                r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                id, REL_NS, kind, target
            )
        })
        .collect();
    format!(
        r#"{}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        XML_HEADER, body
    )
}

fn package_rels() -> String {
    relationships(&[("rId1", "officeDocument", "ppt/presentation.xml")])
}

fn pres_props() -> String {
    format!(r#"{}<p:presentationPr {}/>"#, XML_HEADER, NS_DECL)
}

fn view_props() -> String {
    format!(
        r#"{}<p:viewPr {}><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#,
        XML_HEADER, NS_DECL
    )
}

fn table_styles() -> String {
    format!(
        r#"{}<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#,
        XML_HEADER
    )
}

const EMPTY_TREE: &str = r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree>"#;

fn slide_master() -> String {
    format!(
        r#"{}<p:sldMaster {}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>{}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#,
        XML_HEADER, NS_DECL, EMPTY_TREE
    )
}

fn slide_layout() -> String {
    format!(
        r#"{}<p:sldLayout {} type="blank" preserve="1"><p:cSld name="Blank">{}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        XML_HEADER, NS_DECL, EMPTY_TREE
    )
}

fn theme() -> String {
    let solid = |c: &str| format!(r#"<a:solidFill><a:schemeClr val="{}"/></a:solidFill>"#, c);
    let line = r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#;
    format!(
        r#"{header}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{ph}{ph}{ph}</a:fillStyleLst><a:lnStyleLst>{line}{line}{line}</a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst>{ph}{ph}{ph}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        header = XML_HEADER,
        ph = solid("phClr"),
        line = line
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameExtractor;
    use crate::package::PptxPackage;
    use crate::theme::ThemeColors;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        // Any bytes work; the writer never decodes images.
        b"\x89PNG\r\n\x1a\nfake".to_vec()
    }

    fn round_trip(writer: &DeckWriter) -> PptxPackage {
        let mut buffer = Cursor::new(Vec::new());
        writer.write_to(&mut buffer).unwrap();
        PptxPackage::from_reader(Cursor::new(buffer.into_inner())).unwrap()
    }

    #[test]
    fn test_blank_deck_structure() {
        let mut writer = DeckWriter::new(SlideSize::new(12_192_000, 6_858_000));
        writer.add_slide();
        writer.add_slide();
        let package = round_trip(&writer);

        assert_eq!(
            package.slide_parts().unwrap(),
            vec!["ppt/slides/slide1.xml", "ppt/slides/slide2.xml"]
        );
        assert_eq!(
            package.slide_size().unwrap(),
            SlideSize::new(12_192_000, 6_858_000)
        );
        let theme = ThemeColors::load(&package).unwrap();
        assert_eq!(theme.scheme("accent1"), Some("#4472C4"));
    }

    #[test]
    fn test_pictures_keep_exact_rects_and_share_media() {
        let mut writer = DeckWriter::new(SlideSize::new(9_144_000, 6_858_000));
        let first = writer.add_slide();
        let second = writer.add_slide();
        let a = FrameRect::new(-12_345, 100, 3_000_001, 2_000_003);
        let b = FrameRect::new(4_000_000, 5_000_000, 1_000_000, 500_000);
        writer.add_picture(first, a, png_bytes(), "png").unwrap();
        writer.add_picture(first, b, png_bytes(), ".PNG").unwrap();
        writer.add_picture(second, b, vec![1, 2, 3], "jpg").unwrap();

        let package = round_trip(&writer);
        let media = package
            .part_names()
            .filter(|name| name.starts_with("ppt/media/"))
            .count();
        assert_eq!(media, 2);
        let frames = FrameExtractor::new().extract(&package).unwrap();
        assert_eq!(frames[&1], vec![a, b]);
        assert_eq!(frames[&2], vec![b]);
        assert!(package.has_part("ppt/media/image1.png"));
        assert!(package.has_part("ppt/media/image2.jpg"));
    }

    #[test]
    fn test_rejects_bad_slide_and_type() {
        let mut writer = DeckWriter::new(SlideSize::new(1, 1));
        assert!(writer
            .add_picture(1, FrameRect::new(0, 0, 1, 1), png_bytes(), "png")
            .is_err());
        writer.add_slide();
        assert!(matches!(
            writer.add_picture(1, FrameRect::new(0, 0, 1, 1), png_bytes(), "exe"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_deck_is_valid_package() {
        let writer = DeckWriter::new(SlideSize::new(9_144_000, 6_858_000));
        let package = round_trip(&writer);
        assert!(package.slide_parts().unwrap().is_empty());
    }
}
