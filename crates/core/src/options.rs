//! Per-invocation settings for extraction, rebuild and HTML export.

use serde::{Deserialize, Serialize};

/// JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Settings for slide rasterization and frame cropping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Produce screenshots at all.
    pub enabled: bool,
    /// Crop one image per shape frame instead of one per slide.
    pub per_frame: bool,
    /// Explicit raster DPI (clamped to 72..=300).
    pub dpi: Option<u32>,
    /// Upper bound for output image width.
    pub max_width_px: Option<u32>,
    /// Upper bound for output image height.
    pub max_height_px: Option<u32>,
    pub jpeg_quality: u8,
    /// Allow resizing crops up to the bounds.
    pub allow_upscale: bool,
    /// Worker count for the per-slide rendering fallback.
    pub parallelism: usize,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            per_frame: false,
            dpi: None,
            max_width_px: None,
            max_height_px: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            allow_upscale: false,
            parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl ScreenshotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_per_frame(mut self, per_frame: bool) -> Self {
        self.per_frame = per_frame;
        self
    }

    pub fn with_dpi(mut self, dpi: Option<u32>) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_max_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.max_width_px = width.filter(|w| *w > 0);
        self.max_height_px = height.filter(|h| *h > 0);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn with_allow_upscale(mut self, allow: bool) -> Self {
        self.allow_upscale = allow;
        self
    }

    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = workers.max(1); // At least one worker
        self
    }
}

/// Settings for decomposing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub screenshots: ScreenshotOptions,
    /// Write `texts/slide-NNN.txt`.
    pub texts: bool,
    /// Write `attachments/*`.
    pub attachments: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            screenshots: ScreenshotOptions::default(),
            texts: true,
            attachments: true,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screenshots(mut self, screenshots: ScreenshotOptions) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn with_texts(mut self, texts: bool) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_attachments(mut self, attachments: bool) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Settings for rebuilding a deck from a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOptions {
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Place whole-slide screenshots when a slide has no frame crops.
    pub slide_fallback: bool,
}

impl RebuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_slide_fallback(mut self, fallback: bool) -> Self {
        self.slide_fallback = fallback;
        self
    }
}

/// Settings for HTML export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlOptions {
    /// Copy embedded objects and slide images to `attachments/`.
    pub attachments: bool,
    /// Start from the external renderer's HTML export. When disabled, each
    /// slide is built from the reconstructed blocks only.
    pub include_export: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            attachments: true,
            include_export: true,
        }
    }
}

impl HtmlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attachments(mut self, attachments: bool) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_include_export(mut self, include: bool) -> Self {
        self.include_export = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_builder_clamps() {
        let opts = ScreenshotOptions::new()
            .with_jpeg_quality(0)
            .with_parallelism(0)
            .with_max_size(Some(0), Some(1080));
        assert_eq!(opts.jpeg_quality, 1);
        assert_eq!(opts.parallelism, 1);
        assert_eq!(opts.max_width_px, None);
        assert_eq!(opts.max_height_px, Some(1080));
    }

    #[test]
    fn test_defaults() {
        let opts = ExtractOptions::default();
        assert!(opts.texts && opts.attachments && opts.screenshots.enabled);
        assert!(!opts.screenshots.per_frame);
        assert_eq!(opts.screenshots.jpeg_quality, DEFAULT_JPEG_QUALITY);
        assert!(opts.screenshots.parallelism >= 1);

        let rebuild = RebuildOptions::default();
        assert!(!rebuild.overwrite && !rebuild.slide_fallback);
    }
}
