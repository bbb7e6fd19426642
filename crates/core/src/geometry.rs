//! Coordinate translation between EMU and pixel space.
//!
//! Slide parts express positions in English Metric Units (914400 per inch).
//! Three kinds of artifact need pixel coordinates: rasterized slide
//! screenshots, per-frame crops of those screenshots, and the HTML layout.

use serde::{Deserialize, Serialize};

/// EMUs per inch.
pub const EMU_PER_INCH: f64 = 914_400.0;

/// CSS pixels per inch at 100% scale.
pub const PX_PER_INCH: f64 = 96.0;

/// Points per inch.
pub const PT_PER_INCH: f64 = 72.0;

/// Lowest DPI used for raster export.
pub const MIN_DPI: u32 = 72;

/// Highest DPI used for raster export.
pub const MAX_DPI: u32 = 300;

/// DPI used when the size bounds give no usable answer.
pub const DEFAULT_DPI: u32 = 150;

/// Slide canvas size in EMU. Zero in either dimension means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSize {
    pub width: i64,
    pub height: i64,
}

impl SlideSize {
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// Whether both dimensions are known.
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The whole canvas as a frame rectangle.
    pub fn full_rect(&self) -> FrameRect {
        FrameRect::new(0, 0, self.width, self.height)
    }

    pub fn width_px(&self) -> f64 {
        px_from_emu(self.width)
    }

    pub fn height_px(&self) -> f64 {
        px_from_emu(self.height)
    }
}

/// A shape's bounding rectangle in EMU.
///
/// Offsets may be negative (off-canvas); consumers clip as needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl FrameRect {
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    /// A rectangle is usable only with a positive extent in both axes.
    pub fn is_usable(&self) -> bool {
        self.cx > 0 && self.cy > 0
    }

    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.cy as f64 / 2.0
    }
}

/// An integer rectangle inside a raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Convert EMU to CSS pixels (1 inch = 96 px).
pub fn px_from_emu(value: i64) -> f64 {
    value as f64 / EMU_PER_INCH * PX_PER_INCH
}

/// Convert hundredths of a point (run font sizes, point spacing) to pixels.
pub fn px_from_hundredth_point(value: i64) -> f64 {
    pt_to_px(value as f64 / 100.0)
}

/// Convert points to pixels.
pub fn pt_to_px(points: f64) -> f64 {
    points * PX_PER_INCH / PT_PER_INCH
}

/// Pick the DPI for rasterizing slides.
///
/// An explicit DPI wins (clamped). Otherwise the largest DPI that keeps the
/// raster inside both pixel bounds is used; a missing bound is unbounded.
pub fn resolve_dpi(
    explicit: Option<u32>,
    max_width_px: Option<u32>,
    max_height_px: Option<u32>,
    slide: SlideSize,
) -> u32 {
    if let Some(dpi) = explicit {
        return dpi.clamp(MIN_DPI, MAX_DPI);
    }

    let width_in = slide.width as f64 / EMU_PER_INCH;
    let height_in = slide.height as f64 / EMU_PER_INCH;

    let by_width = max_width_px
        .map(|w| w as f64 / width_in)
        .unwrap_or(f64::INFINITY);
    let by_height = max_height_px
        .map(|h| h as f64 / height_in)
        .unwrap_or(f64::INFINITY);

    let dpi = by_width.min(by_height);
    if !dpi.is_finite() || dpi <= 0.0 {
        return DEFAULT_DPI;
    }

    (dpi.round() as u32).clamp(MIN_DPI, MAX_DPI)
}

/// Map an EMU rectangle onto a raster of the whole slide.
///
/// Returns `None` when the rectangle has no area after rounding, or when it
/// lies entirely outside the raster once negative offsets are clipped.
pub fn emu_rect_to_pixels(
    rect: FrameRect,
    image_width: u32,
    image_height: u32,
    slide: SlideSize,
) -> Option<PixelRect> {
    if !slide.is_known() || image_width == 0 || image_height == 0 {
        return None;
    }

    let scale_x = image_width as f64 / slide.width as f64;
    let scale_y = image_height as f64 / slide.height as f64;

    let mut x = (rect.x as f64 * scale_x).round() as i64;
    let mut y = (rect.y as f64 * scale_y).round() as i64;
    let mut width = (rect.cx as f64 * scale_x).round() as i64;
    let mut height = (rect.cy as f64 * scale_y).round() as i64;

    if width <= 0 || height <= 0 {
        return None;
    }

    if x < 0 {
        width += x;
        x = 0;
    }
    if y < 0 {
        height += y;
        y = 0;
    }

    let (max_x, max_y) = (image_width as i64, image_height as i64);
    if width <= 0 || height <= 0 || x >= max_x || y >= max_y {
        return None;
    }

    width = width.min(max_x - x);
    height = height.min(max_y - y);

    Some(PixelRect {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE_4_3: SlideSize = SlideSize {
        width: 9_144_000,
        height: 6_858_000,
    };

    #[test]
    fn test_px_from_emu_one_inch() {
        assert_eq!(px_from_emu(914_400), 96.0);
        assert_eq!(px_from_emu(0), 0.0);
    }

    #[test]
    fn test_px_from_hundredth_point() {
        // 18pt = 24px
        assert_eq!(px_from_hundredth_point(1800), 24.0);
        assert_eq!(pt_to_px(12.0), 16.0);
    }

    #[test]
    fn test_resolve_dpi_explicit_is_clamped() {
        assert_eq!(resolve_dpi(Some(600), None, None, SLIDE_4_3), 300);
        assert_eq!(resolve_dpi(Some(10), None, None, SLIDE_4_3), 72);
        assert_eq!(resolve_dpi(Some(120), Some(10), None, SLIDE_4_3), 120);
    }

    #[test]
    fn test_resolve_dpi_from_width_bound() {
        // 10 inch wide slide into 500px gives 50 dpi, clamped up to 72.
        assert_eq!(resolve_dpi(None, Some(500), None, SLIDE_4_3), 72);
        assert_eq!(resolve_dpi(None, Some(2000), None, SLIDE_4_3), 200);
    }

    #[test]
    fn test_resolve_dpi_uses_tighter_bound() {
        // width: 1920/10 = 192, height: 1080/7.5 = 144
        assert_eq!(resolve_dpi(None, Some(1920), Some(1080), SLIDE_4_3), 144);
    }

    #[test]
    fn test_resolve_dpi_defaults() {
        assert_eq!(resolve_dpi(None, None, None, SLIDE_4_3), DEFAULT_DPI);
        assert_eq!(
            resolve_dpi(None, Some(800), None, SlideSize::default()),
            DEFAULT_DPI
        );
    }

    #[test]
    fn test_rect_mapping_scales() {
        let rect = FrameRect::new(914_400, 914_400, 1_828_800, 914_400);
        // 960x720 raster of a 10x7.5in slide = 96 px per inch
        let px = emu_rect_to_pixels(rect, 960, 720, SLIDE_4_3).unwrap();
        assert_eq!(
            px,
            PixelRect {
                x: 96,
                y: 96,
                width: 192,
                height: 96
            }
        );
    }

    #[test]
    fn test_rect_mapping_clips_negative_offsets() {
        let rect = FrameRect::new(-914_400, 0, 1_828_800, 914_400);
        let px = emu_rect_to_pixels(rect, 960, 720, SLIDE_4_3).unwrap();
        assert_eq!(px.x, 0);
        assert_eq!(px.width, 96);
    }

    #[test]
    fn test_rect_mapping_clips_far_edge() {
        let rect = FrameRect::new(8_229_600, 0, 1_828_800, 914_400);
        let px = emu_rect_to_pixels(rect, 960, 720, SLIDE_4_3).unwrap();
        assert_eq!(px.x, 864);
        assert_eq!(px.width, 96);
    }

    #[test]
    fn test_rect_mapping_rejects_outside_and_empty() {
        let left = FrameRect::new(-2_000_000, 0, 1_000_000, 914_400);
        assert!(emu_rect_to_pixels(left, 960, 720, SLIDE_4_3).is_none());

        let right = FrameRect::new(9_144_000, 0, 914_400, 914_400);
        assert!(emu_rect_to_pixels(right, 960, 720, SLIDE_4_3).is_none());

        let tiny = FrameRect::new(0, 0, 10, 10);
        assert!(emu_rect_to_pixels(tiny, 960, 720, SLIDE_4_3).is_none());

        let full = SLIDE_4_3.full_rect();
        assert!(emu_rect_to_pixels(full, 960, 720, SlideSize::default()).is_none());
    }
}
