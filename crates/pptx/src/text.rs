//! Plain paragraph text per slide.

use crate::package::PptxPackage;
use crate::xml::XmlElement;
use deck_core::{Result, TextNormalizer};

/// Raw text of one `a:p` paragraph: runs and fields concatenated, breaks as spaces.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    let mut text = String::new();
    for child in paragraph.elements() {
        match child.name.as_str() {
            "r" | "fld" => {
                if let Some(t) = child.child("t") {
                    text.push_str(&t.text());
                }
            }
            "br" => text.push(' '),
            _ => {}
        }
    }
    text
}

/// All paragraphs of a slide's shape tree (text boxes, placeholders and
/// table cells) in document order, normalized, empty ones dropped.
pub fn slide_paragraphs(slide: &XmlElement, normalizer: &TextNormalizer) -> Vec<String> {
    let Some(sp_tree) = slide.path(&["cSld", "spTree"]) else {
        return Vec::new();
    };
    let raw = sp_tree.find_all("p").into_iter().map(paragraph_text);
    normalizer.normalize_paragraphs(raw)
}

/// Text lines of every slide, in presentation order.
pub fn extract_slide_texts(package: &PptxPackage) -> Result<Vec<Vec<String>>> {
    let normalizer = TextNormalizer::new();
    package
        .slide_parts()?
        .iter()
        .map(|part| {
            let slide = package.part_xml(part)?;
            Ok(slide_paragraphs(&slide, &normalizer))
        })
        .collect()
}

/// File name for a slide's text output.
pub fn slide_text_file_name(slide_number: usize) -> String {
    format!("slide-{:03}.txt", slide_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_paragraphs() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>
            <p:sp><p:txBody>
              <a:p><a:r><a:t>Hello</a:t></a:r><a:br/><a:r><a:t>world</a:t></a:r></a:p>
              <a:p><a:endParaRPr/></a:p>
              <a:p><a:fld type="slidenum"><a:t>3</a:t></a:fld></a:p>
            </p:txBody></p:sp>
            <p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tr><a:tc><a:txBody>
              <a:p><a:r><a:t>  Cell   one </a:t></a:r></a:p>
            </a:txBody></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>
        </p:spTree></p:cSld></p:sld>"#;
        let slide = XmlElement::parse(xml).unwrap();
        let lines = slide_paragraphs(&slide, &TextNormalizer::new());
        assert_eq!(lines, vec!["Hello world", "3", "Cell one"]);
    }

    #[test]
    fn test_slide_text_file_name() {
        assert_eq!(slide_text_file_name(1), "slide-001.txt");
        assert_eq!(slide_text_file_name(42), "slide-042.txt");
    }
}
