//! Rebuilding a deck from a frame manifest.

use crate::screenshot::resolve_image_path;
use deck_core::{
    Error, FrameKind, FrameMetadataFile, FrameScreenshotInfo, RebuildOptions, Result,
};
use deck_pptx::{ensure_pptx_extension, DeckWriter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What a rebuild produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub output_path: PathBuf,
    pub slide_count: usize,
    /// Manifest entries selected for placement.
    pub items_processed: usize,
    pub images_placed: usize,
    /// Selected entries skipped because the image was absent or unusable.
    pub images_missing: usize,
}

/// Places manifest images onto a fresh deck.
#[derive(Debug, Clone, Default)]
pub struct RebuildEngine {
    options: RebuildOptions,
}

impl RebuildEngine {
    pub fn new(options: RebuildOptions) -> Self {
        Self { options }
    }

    pub fn rebuild(&self, manifest_path: &Path, output_path: &Path) -> Result<RebuildReport> {
        if output_path.as_os_str().is_empty() {
            return Err(Error::Validation("Output path is empty".to_string()));
        }
        ensure_pptx_extension(output_path)?;
        if output_path.exists() && !self.options.overwrite {
            return Err(Error::OutputExists(output_path.to_path_buf()));
        }

        let manifest = FrameMetadataFile::read(manifest_path)?;
        let size = manifest.slide_size();
        if !size.is_known() {
            return Err(Error::Validation(
                "Manifest has no slide size (slideWidthEmu/slideHeightEmu)".to_string(),
            ));
        }

        if output_path.exists() {
            log::info!("Replacing existing {}", output_path.display());
            fs::remove_file(output_path)?;
        }

        let base = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let slide_count = manifest.slide_count();
        let by_slide = group_by_slide(&manifest.frames);

        let mut writer = DeckWriter::new(size);
        let mut report = RebuildReport {
            output_path: output_path.to_path_buf(),
            slide_count,
            items_processed: 0,
            images_placed: 0,
            images_missing: 0,
        };

        for number in 1..=slide_count {
            let slide = writer.add_slide();
            let entries = by_slide
                .get(&number)
                .map(|group| select_entries(group, self.options.slide_fallback))
                .unwrap_or_default();

            for entry in entries {
                report.items_processed += 1;
                let path = resolve_image_path(&base, &entry.file_path);
                if place(&mut writer, slide, entry, &path)? {
                    report.images_placed += 1;
                } else {
                    report.images_missing += 1;
                }
            }
        }

        writer.save(output_path)?;
        log::info!(
            "Rebuilt {} slide(s) with {} image(s) into {}",
            slide_count,
            report.images_placed,
            output_path.display()
        );
        Ok(report)
    }
}

/// Entries grouped by slide; index 0 is not a slide and is dropped.
fn group_by_slide(frames: &[FrameScreenshotInfo]) -> BTreeMap<usize, Vec<&FrameScreenshotInfo>> {
    let mut groups: BTreeMap<usize, Vec<&FrameScreenshotInfo>> = BTreeMap::new();
    for entry in frames {
        if entry.slide_index == 0 {
            log::warn!("Ignoring manifest entry with slideIndex 0 ({})", entry.file_path);
            continue;
        }
        groups.entry(entry.slide_index).or_default().push(entry);
    }
    groups
}

/// Frame entries by frame index; slide entries only when none exist and
/// the fallback is on.
fn select_entries<'a>(
    group: &[&'a FrameScreenshotInfo],
    slide_fallback: bool,
) -> Vec<&'a FrameScreenshotInfo> {
    let of_kind = |kind: FrameKind| {
        let mut picked: Vec<&FrameScreenshotInfo> =
            group.iter().copied().filter(|e| e.kind == kind).collect();
        picked.sort_by_key(|e| e.frame_index);
        picked
    };

    let frames = of_kind(FrameKind::Frame);
    if !frames.is_empty() {
        return frames;
    }
    if slide_fallback {
        return of_kind(FrameKind::Slide);
    }
    Vec::new()
}

/// Place one image; `Ok(false)` when it had to be skipped.
fn place(
    writer: &mut DeckWriter,
    slide: usize,
    entry: &FrameScreenshotInfo,
    path: &Path,
) -> Result<bool> {
    if !path.is_file() {
        log::warn!("Image {} not found, skipping placement", path.display());
        return Ok(false);
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let data = fs::read(path)?;

    match writer.add_picture(slide, entry.rect, data, &extension) {
        Ok(()) => Ok(true),
        Err(Error::UnsupportedFormat(what)) => {
            log::warn!("Skipping {}: unsupported {}", path.display(), what);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::{FrameRect, SlideSize};

    fn entry(slide: usize, frame: usize, kind: FrameKind) -> FrameScreenshotInfo {
        FrameScreenshotInfo {
            slide_index: slide,
            frame_index: frame,
            file_path: format!("s{}-f{}.jpg", slide, frame),
            rect: FrameRect::new(0, 0, 10, 10),
            kind,
        }
    }

    #[test]
    fn test_select_prefers_frames_in_order() {
        let a = entry(1, 2, FrameKind::Frame);
        let b = entry(1, 0, FrameKind::Slide);
        let c = entry(1, 1, FrameKind::Frame);
        let picked = select_entries(&[&a, &b, &c], true);
        let order: Vec<usize> = picked.iter().map(|e| e.frame_index).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_select_slide_fallback() {
        let s = entry(2, 0, FrameKind::Slide);
        assert_eq!(select_entries(&[&s], true).len(), 1);
        assert!(select_entries(&[&s], false).is_empty());
    }

    #[test]
    fn test_existing_output_rejected_before_reading_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pptx");
        fs::write(&out, b"old").unwrap();

        let err = RebuildEngine::default()
            .rebuild(&dir.path().join("missing.json"), &out)
            .unwrap_err();
        assert!(matches!(err, Error::OutputExists(_)));
        assert_eq!(fs::read(&out).unwrap(), b"old");
    }

    #[test]
    fn test_missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = RebuildEngine::default()
            .rebuild(&dir.path().join("frames.json"), &dir.path().join("out.pptx"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_malformed_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("frames.json");
        fs::write(&manifest, "{not json").unwrap();
        let out = dir.path().join("out.pptx");
        let err = RebuildEngine::default().rebuild(&manifest, &out).unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("frames.json");
        let manifest = FrameMetadataFile::new(
            SlideSize::new(9_144_000, 6_858_000),
            vec![entry(1, 1, FrameKind::Frame), entry(3, 0, FrameKind::Slide)],
        );
        manifest.write(&manifest_path).unwrap();

        let out = dir.path().join("out.pptx");
        let report = RebuildEngine::new(RebuildOptions::default().with_slide_fallback(true))
            .rebuild(&manifest_path, &out)
            .unwrap();
        assert_eq!(report.slide_count, 3);
        assert_eq!(report.items_processed, 2);
        assert_eq!(report.images_placed, 0);
        assert_eq!(report.images_missing, 2);
        assert!(out.is_file());
    }
}
