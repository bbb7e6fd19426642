//! View models for one HTML render.
//!
//! These are built per invocation from the source deck and discarded once
//! `index.html` is written; nothing here is persisted.

use crate::geometry::{FrameRect, SlideSize};
use serde::Serialize;

/// One slide ready for HTML emission.
#[derive(Debug, Clone, Serialize)]
pub struct HtmlSlide {
    /// 1-based slide number.
    pub number: usize,
    pub size: SlideSize,
    /// Resolved background colour as `#RRGGBB`.
    pub background_color: String,
    /// Positioned text blocks in document order.
    pub text_blocks: Vec<HtmlTextBlock>,
    /// Image placements in document order.
    pub images: Vec<HtmlImageBlock>,
}

impl HtmlSlide {
    pub fn new(number: usize, size: SlideSize) -> Self {
        Self {
            number,
            size,
            background_color: "#FFFFFF".to_string(),
            text_blocks: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn background_images(&self) -> impl Iterator<Item = &HtmlImageBlock> {
        self.images.iter().filter(|i| i.background)
    }

    pub fn flow_images(&self) -> impl Iterator<Item = &HtmlImageBlock> {
        self.images.iter().filter(|i| !i.background)
    }
}

/// A positioned rich-text shape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HtmlTextBlock {
    pub rect: FrameRect,
    pub paragraphs: Vec<HtmlParagraph>,
}

impl HtmlTextBlock {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.is_empty())
    }
}

/// Bullet descriptor attached to a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Bullet {
    /// Explicit "no bullet" marker.
    NoBullet,
    /// Auto-numbered bullet (`a:buAutoNum`), carrying the numbering scheme.
    Numbered(String),
    /// Character or picture bullet.
    Symbol(Option<String>),
}

/// The list container a paragraph belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl Bullet {
    /// The list kind this bullet opens, if any.
    pub fn list_kind(&self) -> Option<ListKind> {
        match self {
            Bullet::NoBullet => None,
            Bullet::Numbered(_) => Some(ListKind::Ordered),
            Bullet::Symbol(_) => Some(ListKind::Unordered),
        }
    }
}

/// Paragraph or line spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Spacing {
    /// Absolute pixels (converted from points).
    Px(f64),
    /// Relative multiplier (1.0 = 100%).
    Relative(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn from_ooxml(value: &str) -> Option<Self> {
        match value {
            "l" => Some(Self::Left),
            "ctr" => Some(Self::Center),
            "r" => Some(Self::Right),
            "just" | "dist" => Some(Self::Justify),
            _ => None,
        }
    }

    pub fn as_css(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }
}

/// One paragraph of a text block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HtmlParagraph {
    pub runs: Vec<HtmlRun>,
    pub bullet: Option<Bullet>,
    /// Outline level, 0-based.
    pub level: u32,
    /// Explicit left margin in pixels.
    pub margin_left_px: Option<f64>,
    pub align: Option<TextAlign>,
    pub line_spacing: Option<Spacing>,
    pub space_before: Option<Spacing>,
    pub space_after: Option<Spacing>,
}

impl HtmlParagraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.trim().is_empty())
    }

    pub fn list_kind(&self) -> Option<ListKind> {
        self.bullet.as_ref().and_then(Bullet::list_kind)
    }

    /// Left indentation: the explicit margin, or 24px per outline level.
    pub fn indent_px(&self) -> f64 {
        self.margin_left_px
            .unwrap_or(self.level as f64 * LEVEL_INDENT_PX)
    }
}

/// Indentation applied per outline level when no explicit margin exists.
pub const LEVEL_INDENT_PX: f64 = 24.0;

/// A styled text run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HtmlRun {
    pub text: String,
    pub style: RunStyle,
}

/// Fully resolved run style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStyle {
    pub font_family: Option<String>,
    pub size_px: Option<f64>,
    /// `#RRGGBB`
    pub color: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for RunStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            size_px: None,
            color: "#000000".to_string(),
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// One image placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlImageBlock {
    pub rect: FrameRect,
    /// Hex SHA-256 of the image bytes.
    pub hash: String,
    /// Lowercase extension including the dot, e.g. `.png`.
    pub extension: String,
    /// Rendered in the absolute layer behind text.
    pub background: bool,
    /// Small and anchored near a corner of the canvas.
    pub logo_candidate: bool,
}

impl HtmlImageBlock {
    pub fn new(rect: FrameRect, hash: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            rect,
            hash: hash.into(),
            extension: extension.into(),
            background: false,
            logo_candidate: false,
        }
    }

    /// Asset file name shared by every placement of the same bytes.
    pub fn asset_name(&self) -> String {
        asset_file_name(&self.hash, &self.extension)
    }
}

/// `asset-<first 16 hash chars><ext>`.
pub fn asset_file_name(hash: &str, extension: &str) -> String {
    let prefix: String = hash.chars().take(16).collect();
    format!("asset-{}{}", prefix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_list_kind() {
        assert_eq!(Bullet::NoBullet.list_kind(), None);
        assert_eq!(
            Bullet::Numbered("arabicPeriod".into()).list_kind(),
            Some(ListKind::Ordered)
        );
        assert_eq!(
            Bullet::Symbol(Some("•".into())).list_kind(),
            Some(ListKind::Unordered)
        );
    }

    #[test]
    fn test_indent_prefers_explicit_margin() {
        let mut p = HtmlParagraph {
            level: 2,
            ..Default::default()
        };
        assert_eq!(p.indent_px(), 48.0);
        p.margin_left_px = Some(30.0);
        assert_eq!(p.indent_px(), 30.0);
    }

    #[test]
    fn test_asset_name() {
        let img = HtmlImageBlock::new(FrameRect::default(), "0123456789abcdef0123", ".png");
        assert_eq!(img.asset_name(), "asset-0123456789abcdef.png");
    }

    #[test]
    fn test_align_from_ooxml() {
        assert_eq!(TextAlign::from_ooxml("ctr"), Some(TextAlign::Center));
        assert_eq!(TextAlign::from_ooxml("bogus"), None);
        assert_eq!(TextAlign::Justify.as_css(), "justify");
    }
}
