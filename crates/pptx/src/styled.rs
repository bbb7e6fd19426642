//! Styled text and image blocks for HTML reconstruction.
//!
//! Each slide becomes an [`HtmlSlide`]: positioned text blocks with fully
//! resolved run styles, image placements keyed by content hash, and the
//! resolved background colour.

use crate::frames::for_each_shape;
use crate::media::{content_hash, part_extension};
use crate::package::{rel_types, PptxPackage};
use crate::theme::ThemeColors;
use crate::xml::XmlElement;
use deck_core::geometry::{px_from_emu, px_from_hundredth_point};
use deck_core::{
    Bullet, FrameRect, HtmlImageBlock, HtmlParagraph, HtmlRun, HtmlSlide, HtmlTextBlock, Result,
    RunStyle, SlideSize, Spacing, TextAlign,
};
use std::collections::BTreeMap;

/// Colour used when no background is declared anywhere.
const DEFAULT_BACKGROUND: &str = "#FFFFFF";

/// Bytes of one distinct image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub extension: String,
    pub data: Vec<u8>,
}

/// Every slide's blocks plus the de-duplicated image store.
#[derive(Debug, Clone)]
pub struct DeckLayout {
    pub size: SlideSize,
    pub slides: Vec<HtmlSlide>,
    /// Image bytes keyed by content hash.
    pub assets: BTreeMap<String, ImageAsset>,
}

/// Run properties as declared at one level of the cascade.
#[derive(Debug, Clone, Default, PartialEq)]
struct RunProps {
    font: Option<String>,
    size: Option<i64>,
    color: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
    underline: Option<bool>,
}

impl RunProps {
    fn read(rpr: Option<&XmlElement>, theme: &ThemeColors) -> Self {
        let Some(rpr) = rpr else {
            return Self::default();
        };
        Self {
            font: rpr
                .child("latin")
                .and_then(|l| l.attr("typeface"))
                .filter(|face| !face.is_empty() && !face.starts_with('+'))
                .map(str::to_string),
            size: rpr.attr_i64("sz"),
            color: rpr.child("solidFill").and_then(|f| theme.resolve(f)),
            bold: rpr.attr_bool("b"),
            italic: rpr.attr_bool("i"),
            underline: rpr.attr("u").map(|u| u != "none"),
        }
    }

    /// Fill unset properties from a lower-priority level.
    fn or(self, fallback: &RunProps) -> Self {
        Self {
            font: self.font.or_else(|| fallback.font.clone()),
            size: self.size.or(fallback.size),
            color: self.color.or_else(|| fallback.color.clone()),
            bold: self.bold.or(fallback.bold),
            italic: self.italic.or(fallback.italic),
            underline: self.underline.or(fallback.underline),
        }
    }

    fn into_style(self) -> RunStyle {
        let defaults = RunStyle::default();
        RunStyle {
            font_family: self.font,
            size_px: self.size.map(px_from_hundredth_point),
            color: self.color.unwrap_or(defaults.color),
            bold: self.bold.unwrap_or(false),
            italic: self.italic.unwrap_or(false),
            underline: self.underline.unwrap_or(false),
        }
    }
}

/// Builds [`DeckLayout`] from a package.
pub struct LayoutExtractor<'a> {
    package: &'a PptxPackage,
    theme: ThemeColors,
    size: SlideSize,
}

impl<'a> LayoutExtractor<'a> {
    pub fn new(package: &'a PptxPackage) -> Result<Self> {
        Ok(Self {
            package,
            theme: ThemeColors::load(package)?,
            size: package.slide_size()?,
        })
    }

    /// Extract every slide.
    pub fn extract(&self) -> Result<DeckLayout> {
        let mut slides = Vec::new();
        let mut assets = BTreeMap::new();

        for (idx, part) in self.package.slide_parts()?.iter().enumerate() {
            let slide = self.slide(idx + 1, part, &mut assets)?;
            log::debug!(
                "Slide {}: {} text block(s), {} image(s)",
                slide.number,
                slide.text_blocks.len(),
                slide.images.len()
            );
            slides.push(slide);
        }

        Ok(DeckLayout {
            size: self.size,
            slides,
            assets,
        })
    }

    fn slide(
        &self,
        number: usize,
        part: &str,
        assets: &mut BTreeMap<String, ImageAsset>,
    ) -> Result<HtmlSlide> {
        let root = self.package.part_xml(part)?;
        let mut slide = HtmlSlide::new(number, self.size);
        slide.background_color = self.background_color(part, &root)?;

        if let Some(image) = self.background_picture(part, &root, assets)? {
            slide.images.push(image);
        }

        let Some(sp_tree) = root.path(&["cSld", "spTree"]) else {
            return Ok(slide);
        };

        let mut pictures: Vec<(FrameRect, String)> = Vec::new();
        for_each_shape(sp_tree, |shape, rect| {
            let Some(rect) = rect.filter(FrameRect::is_usable) else {
                return;
            };
            match shape.name.as_str() {
                "sp" => {
                    if let Some(body) = shape.child("txBody") {
                        let block = self.text_block(rect, &[body]);
                        if !block.is_empty() {
                            slide.text_blocks.push(block);
                        }
                    }
                    if let Some(rel_id) = shape
                        .path(&["spPr", "blipFill", "blip"])
                        .and_then(|b| b.attr("r:embed"))
                    {
                        pictures.push((rect, rel_id.to_string()));
                    }
                }
                "graphicFrame" => {
                    let bodies = shape.find_all("txBody");
                    if !bodies.is_empty() {
                        let block = self.text_block(rect, &bodies);
                        if !block.is_empty() {
                            slide.text_blocks.push(block);
                        }
                    }
                }
                "pic" => {
                    if let Some(rel_id) = shape
                        .path(&["blipFill", "blip"])
                        .and_then(|b| b.attr("r:embed"))
                    {
                        pictures.push((rect, rel_id.to_string()));
                    }
                }
                _ => {}
            }
        });

        for (rect, rel_id) in pictures {
            if let Some(image) = self.image_block(part, &rel_id, rect, assets)? {
                slide.images.push(image);
            }
        }

        Ok(slide)
    }

    fn image_block(
        &self,
        slide_part: &str,
        rel_id: &str,
        rect: FrameRect,
        assets: &mut BTreeMap<String, ImageAsset>,
    ) -> Result<Option<HtmlImageBlock>> {
        let Some(target) = self.package.resolve_rel(slide_part, rel_id)? else {
            log::warn!("{}: image relationship {} not found", slide_part, rel_id);
            return Ok(None);
        };
        let Ok(data) = self.package.part_bytes(&target) else {
            log::warn!("{}: image part {} missing", slide_part, target);
            return Ok(None);
        };

        let hash = content_hash(data);
        let extension = part_extension(&target);
        assets.entry(hash.clone()).or_insert_with(|| ImageAsset {
            extension: extension.clone(),
            data: data.to_vec(),
        });

        Ok(Some(HtmlImageBlock::new(rect, hash, extension)))
    }

    /// A picture fill on `p:bg` becomes a full-canvas image.
    fn background_picture(
        &self,
        part: &str,
        root: &XmlElement,
        assets: &mut BTreeMap<String, ImageAsset>,
    ) -> Result<Option<HtmlImageBlock>> {
        let rel_id = root
            .path(&["cSld", "bg", "bgPr", "blipFill", "blip"])
            .and_then(|b| b.attr("r:embed"));
        match rel_id {
            Some(rel_id) => self.image_block(part, rel_id, self.size.full_rect(), assets),
            None => Ok(None),
        }
    }

    /// Slide background, falling back to its layout, then master, then white.
    fn background_color(&self, part: &str, root: &XmlElement) -> Result<String> {
        if let Some(color) = self.declared_background(root) {
            return Ok(color);
        }

        if let Some(layout) = self.package.related_part(part, rel_types::SLIDE_LAYOUT)? {
            if let Ok(layout_root) = self.package.part_xml(&layout) {
                if let Some(color) = self.declared_background(&layout_root) {
                    return Ok(color);
                }
            }
            if let Some(master) = self.package.related_part(&layout, rel_types::SLIDE_MASTER)? {
                if let Ok(master_root) = self.package.part_xml(&master) {
                    if let Some(color) = self.declared_background(&master_root) {
                        return Ok(color);
                    }
                }
            }
        }

        Ok(DEFAULT_BACKGROUND.to_string())
    }

    fn declared_background(&self, root: &XmlElement) -> Option<String> {
        let bg = root.path(&["cSld", "bg"])?;
        if let Some(fill) = bg.path(&["bgPr", "solidFill"]) {
            return self.theme.resolve(fill);
        }
        // bgRef carries the colour as a child (schemeClr/srgbClr).
        bg.child("bgRef").and_then(|r| self.theme.resolve(r))
    }

    fn text_block(&self, rect: FrameRect, bodies: &[&XmlElement]) -> HtmlTextBlock {
        let mut block = HtmlTextBlock {
            rect,
            paragraphs: Vec::new(),
        };
        for body in bodies {
            let list_style = body.child("lstStyle");
            for p in body.children_named("p") {
                block.paragraphs.push(self.paragraph(p, list_style));
            }
        }
        block
    }

    fn paragraph(&self, p: &XmlElement, list_style: Option<&XmlElement>) -> HtmlParagraph {
        let ppr = p.child("pPr");
        let level = ppr
            .and_then(|pp| pp.attr_i64("lvl"))
            .unwrap_or(0)
            .clamp(0, 8) as u32;
        let level_ppr =
            list_style.and_then(|ls| ls.child(&format!("lvl{}pPr", level + 1)));

        let list_defaults = RunProps::read(level_ppr.and_then(|l| l.child("defRPr")), &self.theme);
        let para_defaults = RunProps::read(ppr.and_then(|pp| pp.child("defRPr")), &self.theme)
            .or(&list_defaults);

        let mut runs = Vec::new();
        for child in p.elements() {
            match child.name.as_str() {
                "r" | "fld" => {
                    let text = child.child("t").map(|t| t.text()).unwrap_or_default();
                    if text.is_empty() {
                        continue;
                    }
                    let style = RunProps::read(child.child("rPr"), &self.theme)
                        .or(&para_defaults)
                        .into_style();
                    runs.push(HtmlRun { text, style });
                }
                "br" => {
                    let style = RunProps::read(child.child("rPr"), &self.theme)
                        .or(&para_defaults)
                        .into_style();
                    runs.push(HtmlRun {
                        text: "\n".to_string(),
                        style,
                    });
                }
                _ => {}
            }
        }

        let attr = |name: &str| ppr.and_then(|pp| pp.attr(name)).or_else(|| level_ppr.and_then(|l| l.attr(name)));
        let spacing = |name: &str| {
            ppr.and_then(|pp| pp.child(name))
                .or_else(|| level_ppr.and_then(|l| l.child(name)))
                .and_then(read_spacing)
        };

        HtmlParagraph {
            runs,
            bullet: read_bullet(ppr).or_else(|| read_bullet(level_ppr)),
            level,
            margin_left_px: attr("marL")
                .and_then(|v| v.parse::<i64>().ok())
                .map(px_from_emu),
            align: attr("algn").and_then(TextAlign::from_ooxml),
            line_spacing: spacing("lnSpc"),
            space_before: spacing("spcBef"),
            space_after: spacing("spcAft"),
        }
    }
}

/// Bullet descriptor of a paragraph-properties element.
fn read_bullet(ppr: Option<&XmlElement>) -> Option<Bullet> {
    let ppr = ppr?;
    for child in ppr.elements() {
        match child.name.as_str() {
            "buNone" => return Some(Bullet::NoBullet),
            "buAutoNum" => {
                return Some(Bullet::Numbered(
                    child.attr("type").unwrap_or("arabicPeriod").to_string(),
                ))
            }
            "buChar" => return Some(Bullet::Symbol(child.attr("char").map(str::to_string))),
            "buBlip" => return Some(Bullet::Symbol(None)),
            _ => {}
        }
    }
    None
}

/// `a:spcPct` is kept relative, `a:spcPts` converts to pixels.
fn read_spacing(element: &XmlElement) -> Option<Spacing> {
    if let Some(pct) = element.child("spcPct").and_then(|s| s.attr_i64("val")) {
        return Some(Spacing::Relative(pct as f64 / 100_000.0));
    }
    element
        .child("spcPts")
        .and_then(|s| s.attr_i64("val"))
        .map(|pts| Spacing::Px(px_from_hundredth_point(pts)))
}
