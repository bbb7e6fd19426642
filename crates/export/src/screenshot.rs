//! Slide rasterization and per-frame cropping.

use crate::renderer::{ConvertMode, ConvertRequest, PageRasterizer, Renderer};
use crate::tool::scaled_timeout;
use deck_core::geometry::{emu_rect_to_pixels, resolve_dpi};
use deck_core::{Error, FrameRect, FrameScreenshotInfo, Result, ScreenshotOptions, SlideSize};
use deck_pptx::{isolate_slide, PptxPackage};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-slide budget for the whole-document conversion.
const WHOLE_DOCUMENT_SECS_PER_SLIDE: Duration = Duration::from_secs(5);
/// Budget for converting one isolated slide.
const ISOLATED_SECS_PER_SLIDE: Duration = Duration::from_secs(10);

/// How the slide images were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RasterStrategy {
    WholeDocument,
    PerSlide,
}

/// Screenshots written by one pipeline run.
#[derive(Debug, Clone)]
pub struct ScreenshotSet {
    pub entries: Vec<FrameScreenshotInfo>,
    pub strategy: RasterStrategy,
    pub dpi: u32,
}

/// File name of a whole-slide screenshot.
pub fn slide_image_name(slide: usize) -> String {
    format!("slide-{:03}.jpg", slide)
}

/// File name of a frame crop (`frame` is 1-based).
pub fn frame_image_name(slide: usize, frame: usize) -> String {
    format!("slide-{:03}-frame-{:02}.jpg", slide, frame)
}

/// Rasterizes slides through a [`Renderer`] and [`PageRasterizer`].
pub struct ScreenshotPipeline<'a> {
    renderer: &'a dyn Renderer,
    rasterizer: &'a dyn PageRasterizer,
    options: ScreenshotOptions,
}

impl<'a> ScreenshotPipeline<'a> {
    pub fn new(
        renderer: &'a dyn Renderer,
        rasterizer: &'a dyn PageRasterizer,
        options: ScreenshotOptions,
    ) -> Self {
        Self {
            renderer,
            rasterizer,
            options,
        }
    }

    /// Rasterize every slide of `source` into `out_dir`.
    ///
    /// `frames` maps 1-based slide numbers to their frame rectangles; it only
    /// matters in per-frame mode. File paths in the returned entries are
    /// relative to `out_dir`.
    pub fn run(
        &self,
        source: &Path,
        package: &PptxPackage,
        frames: &BTreeMap<usize, Vec<FrameRect>>,
        out_dir: &Path,
    ) -> Result<ScreenshotSet> {
        let slide_count = package.slide_parts()?.len();
        let size = package.slide_size()?;
        let dpi = resolve_dpi(
            self.options.dpi,
            self.options.max_width_px,
            self.options.max_height_px,
            size,
        );

        if slide_count == 0 {
            return Ok(ScreenshotSet {
                entries: Vec::new(),
                strategy: RasterStrategy::WholeDocument,
                dpi,
            });
        }

        fs::create_dir_all(out_dir)?;
        // Dropping the TempDir removes it; removal errors are ignored.
        let work = tempfile::Builder::new().prefix("deck-shots-").tempdir()?;
        log::info!(
            "Rasterizing {} slide(s) of {} at {} dpi",
            slide_count,
            source.display(),
            dpi
        );

        let slide_frames = |n: usize| frames.get(&n).map(Vec::as_slice).unwrap_or(&[]);

        let whole = ConvertRequest::new(source, work.path().join("document"), ConvertMode::Pdf)
            .with_timeout(scaled_timeout(slide_count, WHOLE_DOCUMENT_SECS_PER_SLIDE));
        let pdf = self.renderer.convert(&whole)?;
        let pages = self.rasterizer.page_count(&pdf)?;

        if pages >= slide_count {
            let mut entries = Vec::new();
            for n in 1..=slide_count {
                let image = self.rasterizer.render_page(&pdf, n - 1, dpi)?;
                entries.extend(self.emit(n, &image, slide_frames(n), size, out_dir)?);
            }
            return Ok(ScreenshotSet {
                entries,
                strategy: RasterStrategy::WholeDocument,
                dpi,
            });
        }

        log::warn!(
            "Whole-document export produced {} page(s) for {} slide(s); rendering slides individually",
            pages,
            slide_count
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallelism.max(1))
            .build()
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        let per_slide: Vec<Vec<FrameScreenshotInfo>> = pool.install(|| {
            (1..=slide_count)
                .into_par_iter()
                .map(|n| {
                    let image = self.render_isolated(package, n, dpi, work.path())?;
                    self.emit(n, &image, slide_frames(n), size, out_dir)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(ScreenshotSet {
            entries: per_slide.into_iter().flatten().collect(),
            strategy: RasterStrategy::PerSlide,
            dpi,
        })
    }

    /// Convert a single-slide copy of the deck and rasterize its only page.
    fn render_isolated(
        &self,
        package: &PptxPackage,
        slide: usize,
        dpi: u32,
        work: &Path,
    ) -> Result<DynamicImage> {
        let slide_dir = work.join(format!("slide-{:03}", slide));
        fs::create_dir_all(&slide_dir)?;
        let input = slide_dir.join(format!("slide-{:03}.pptx", slide));
        fs::write(&input, isolate_slide(package, slide)?)?;

        let request = ConvertRequest::new(&input, slide_dir.join("out"), ConvertMode::Pdf)
            .with_timeout(scaled_timeout(1, ISOLATED_SECS_PER_SLIDE))
            .with_profile_dir(slide_dir.join("profile"));
        let pdf = self.renderer.convert(&request)?;
        log::debug!("Slide {} rendered in isolation", slide);
        self.rasterizer.render_page(&pdf, 0, dpi)
    }

    /// Save the crops (or the whole slide) for one rasterized slide.
    fn emit(
        &self,
        slide: usize,
        image: &DynamicImage,
        frames: &[FrameRect],
        size: SlideSize,
        out_dir: &Path,
    ) -> Result<Vec<FrameScreenshotInfo>> {
        let mut entries = Vec::new();

        if self.options.per_frame {
            for (idx, rect) in frames.iter().enumerate() {
                let Some(px) = emu_rect_to_pixels(*rect, image.width(), image.height(), size)
                else {
                    log::warn!("Slide {} frame {} lies outside the raster", slide, idx + 1);
                    continue;
                };
                let crop = image.crop_imm(px.x, px.y, px.width, px.height);
                let name = frame_image_name(slide, idx + 1);
                self.save(&crop, &out_dir.join(&name))?;
                entries.push(FrameScreenshotInfo::frame(slide, idx + 1, name, *rect));
            }
        }

        if entries.is_empty() {
            let name = slide_image_name(slide);
            self.save(image, &out_dir.join(&name))?;
            entries.push(FrameScreenshotInfo::slide(slide, name, size));
        }

        Ok(entries)
    }

    fn save(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        let fitted = fit_to_bounds(
            image,
            self.options.max_width_px,
            self.options.max_height_px,
            self.options.allow_upscale,
        );
        write_jpeg(fitted.as_ref().unwrap_or(image), path, self.options.jpeg_quality)
    }
}

/// Resize to fit the bounds, preserving aspect ratio.
///
/// Returns `None` when the image can stay as it is.
pub fn fit_to_bounds(
    image: &DynamicImage,
    max_width: Option<u32>,
    max_height: Option<u32>,
    allow_upscale: bool,
) -> Option<DynamicImage> {
    let (w, h) = (image.width() as f64, image.height() as f64);
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let sx = max_width.map(|m| m as f64 / w).unwrap_or(f64::INFINITY);
    let sy = max_height.map(|m| m as f64 / h).unwrap_or(f64::INFINITY);
    let scale = sx.min(sy);

    if !scale.is_finite() || (scale - 1.0).abs() < f64::EPSILON {
        return None;
    }
    if scale > 1.0 && !allow_upscale {
        return None;
    }

    let nw = ((w * scale).round() as u32).max(1);
    let nh = ((h * scale).round() as u32).max(1);
    Some(image.resize_exact(nw, nh, FilterType::Lanczos3))
}

/// Encode as baseline JPEG.
pub fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let rgb = image.to_rgb8();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| Error::ImageError(format!("Failed to encode {}: {}", path.display(), e)))?;
    writer.flush()?;
    Ok(())
}

/// Path of a manifest entry's image, relative entries resolved against `base`.
pub fn resolve_image_path(base: &Path, file_path: &str) -> PathBuf {
    let path = Path::new(file_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_image_names() {
        assert_eq!(slide_image_name(7), "slide-007.jpg");
        assert_eq!(frame_image_name(12, 3), "slide-012-frame-03.jpg");
    }

    #[test]
    fn test_fit_never_upscales_by_default() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        assert!(fit_to_bounds(&img, Some(400), Some(400), false).is_none());
        let up = fit_to_bounds(&img, Some(400), None, true).unwrap();
        assert_eq!((up.width(), up.height()), (400, 200));
    }

    #[test]
    fn test_fit_downscales_to_tighter_bound() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1000, 500));
        let fitted = fit_to_bounds(&img, Some(500), Some(100), false).unwrap();
        assert_eq!((fitted.width(), fitted.height()), (200, 100));
        assert!(fit_to_bounds(&img, None, None, false).is_none());
    }

    #[test]
    fn test_write_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([200, 10, 10])));
        write_jpeg(&img, &path, 85).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_resolve_image_path() {
        let base = Path::new("/data/shots");
        assert_eq!(
            resolve_image_path(base, "slide-001.jpg"),
            PathBuf::from("/data/shots/slide-001.jpg")
        );
        assert_eq!(
            resolve_image_path(base, "/abs/x.jpg"),
            PathBuf::from("/abs/x.jpg")
        );
    }
}
