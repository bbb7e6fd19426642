//! Decomposing decks into texts, attachments, screenshots and a manifest.

use crate::renderer::{PageRasterizer, Renderer};
use crate::screenshot::{RasterStrategy, ScreenshotPipeline};
use deck_core::{
    Error, ExtractOptions, FrameMetadataFile, Result, SlideSize, TextNormalizer,
    MANIFEST_FILE_NAME,
};
use deck_pptx::{
    collect_attachments, ensure_pptx_extension, extract_slide_texts, slide_text_file_name,
    FrameExtractor, PptxPackage,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const TEXTS_DIR: &str = "texts";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// What one extraction wrote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub slide_count: usize,
    pub slide_size: SlideSize,
    pub text_files: usize,
    pub attachments: usize,
    pub screenshots: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster_strategy: Option<RasterStrategy>,
    /// Present only when a manifest was written.
    pub manifest_path: Option<PathBuf>,
}

/// Outcome for one document of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ExtractionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        self.report.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

/// Reject empty, missing and non-`.pptx` sources.
pub fn validate_source(source: &Path) -> Result<()> {
    if source.as_os_str().is_empty() {
        return Err(Error::Validation("Source path is empty".to_string()));
    }
    if !source.exists() {
        return Err(Error::NotFound(source.to_path_buf()));
    }
    if !source.is_file() {
        return Err(Error::Validation(format!(
            "Source is not a file: {}",
            source.display()
        )));
    }
    ensure_pptx_extension(source)
}

/// Runs extractions with a fixed renderer, rasterizer and options.
pub struct Extractor<'a> {
    renderer: &'a dyn Renderer,
    rasterizer: &'a dyn PageRasterizer,
    options: ExtractOptions,
}

impl<'a> Extractor<'a> {
    pub fn new(
        renderer: &'a dyn Renderer,
        rasterizer: &'a dyn PageRasterizer,
        options: ExtractOptions,
    ) -> Self {
        Self {
            renderer,
            rasterizer,
            options,
        }
    }

    /// Decompose one document into `output_dir`.
    pub fn extract_document(&self, source: &Path, output_dir: &Path) -> Result<ExtractionReport> {
        validate_source(source)?;
        let package = PptxPackage::open(source)?;
        let slide_count = package.slide_parts()?.len();
        let slide_size = package.slide_size()?;
        log::info!(
            "Extracting {} ({} slide(s)) into {}",
            source.display(),
            slide_count,
            output_dir.display()
        );
        fs::create_dir_all(output_dir)?;

        let mut report = ExtractionReport {
            source: source.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            slide_count,
            slide_size,
            text_files: 0,
            attachments: 0,
            screenshots: 0,
            raster_strategy: None,
            manifest_path: None,
        };

        if self.options.texts {
            report.text_files = write_texts(&package, &output_dir.join(TEXTS_DIR))?;
        }

        if self.options.attachments {
            report.attachments = write_attachments(&package, &output_dir.join(ATTACHMENTS_DIR))?;
        }

        if self.options.screenshots.enabled && slide_count > 0 {
            let shots_dir = output_dir.join(SCREENSHOTS_DIR);
            let frames = FrameExtractor::new().extract(&package)?;
            let pipeline = ScreenshotPipeline::new(
                self.renderer,
                self.rasterizer,
                self.options.screenshots.clone(),
            );
            let set = pipeline.run(source, &package, &frames, &shots_dir)?;
            report.screenshots = set.entries.len();
            report.raster_strategy = Some(set.strategy);

            if !set.entries.is_empty() && slide_size.is_known() {
                let path = shots_dir.join(MANIFEST_FILE_NAME);
                FrameMetadataFile::new(slide_size, set.entries).write(&path)?;
                report.manifest_path = Some(path);
            } else if !set.entries.is_empty() {
                log::warn!("Slide size unknown; no manifest written for {}", source.display());
            }
        }

        Ok(report)
    }

    /// Extract each document into `output_root/<file stem>/`.
    ///
    /// A failing document is recorded in its item and the rest continue.
    pub fn extract_batch<P: AsRef<Path>>(&self, sources: &[P], output_root: &Path) -> BatchReport {
        let mut used_dirs: HashSet<PathBuf> = HashSet::new();
        let mut items = Vec::with_capacity(sources.len());

        for source in sources {
            let source = source.as_ref();
            let output_dir = unique_output_dir(output_root, source, &mut used_dirs);
            let item = match self.extract_document(source, &output_dir) {
                Ok(report) => BatchItem {
                    source: source.to_path_buf(),
                    report: Some(report),
                    error: None,
                },
                Err(e) => {
                    log::warn!("Extraction of {} failed: {}", source.display(), e);
                    BatchItem {
                        source: source.to_path_buf(),
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            items.push(item);
        }

        let succeeded = items.iter().filter(|i| i.is_success()).count();
        BatchReport {
            requested: sources.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        }
    }
}

fn write_texts(package: &PptxPackage, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)?;
    let normalizer = TextNormalizer::new();
    let slides = extract_slide_texts(package)?;
    for (idx, lines) in slides.iter().enumerate() {
        let path = dir.join(slide_text_file_name(idx + 1));
        fs::write(&path, normalizer.to_file_content(lines))?;
    }
    log::debug!("Wrote {} text file(s)", slides.len());
    Ok(slides.len())
}

fn write_attachments(package: &PptxPackage, dir: &Path) -> Result<usize> {
    let attachments = collect_attachments(package)?;
    if attachments.is_empty() {
        return Ok(0);
    }
    fs::create_dir_all(dir)?;
    for attachment in &attachments {
        fs::write(dir.join(&attachment.file_name), attachment.data)?;
    }
    Ok(attachments.len())
}

fn unique_output_dir(root: &Path, source: &Path, used: &mut HashSet<PathBuf>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    let mut candidate = root.join(&stem);
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = root.join(format!("{}-{}", stem, n));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source() {
        assert!(matches!(
            validate_source(Path::new("")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            validate_source(Path::new("/nonexistent/deck.pptx")),
            Err(Error::NotFound(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        assert!(matches!(
            validate_source(&txt),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unique_output_dir() {
        let mut used = HashSet::new();
        let root = Path::new("/out");
        assert_eq!(
            unique_output_dir(root, Path::new("/a/deck.pptx"), &mut used),
            PathBuf::from("/out/deck")
        );
        assert_eq!(
            unique_output_dir(root, Path::new("/b/deck.pptx"), &mut used),
            PathBuf::from("/out/deck-2")
        );
    }
}
