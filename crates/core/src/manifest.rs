//! The frame manifest (`screenshots/frames.json`).
//!
//! This is the only artifact shared between extraction and rebuild, which may
//! run as separate processes on different machines. The JSON field names are
//! a stable wire schema:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "slideWidthEmu": 9144000,
//!   "slideHeightEmu": 6858000,
//!   "frames": [
//!     { "slideIndex": 1, "frameIndex": 0, "filePath": "slide-001.jpg",
//!       "x": 0, "y": 0, "cx": 9144000, "cy": 6858000, "kind": "slide" }
//!   ]
//! }
//! ```
//!
//! Reading is case-insensitive on field names (and on the `kind` value).

use crate::error::{Error, Result};
use crate::geometry::{FrameRect, SlideSize};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// File name of the manifest inside the screenshots directory.
pub const MANIFEST_FILE_NAME: &str = "frames.json";

/// Canonical field names, matched case-insensitively on read.
const FIELD_NAMES: &[&str] = &[
    "schemaVersion",
    "slideWidthEmu",
    "slideHeightEmu",
    "frames",
    "slideIndex",
    "frameIndex",
    "filePath",
    "x",
    "y",
    "cx",
    "cy",
    "kind",
];

/// What a screenshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// The whole slide.
    Slide,
    /// A crop of one shape's bounding box.
    Frame,
}

/// One screenshot and the EMU rectangle it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameScreenshotInfo {
    /// 1-based slide index.
    pub slide_index: usize,
    /// 0 for whole-slide screenshots, otherwise 1-based frame number.
    pub frame_index: usize,
    /// Image path, relative to the manifest directory unless absolute.
    pub file_path: String,
    #[serde(flatten)]
    pub rect: FrameRect,
    pub kind: FrameKind,
}

impl FrameScreenshotInfo {
    /// A whole-slide entry covering the full canvas.
    pub fn slide(slide_index: usize, file_path: impl Into<String>, size: SlideSize) -> Self {
        Self {
            slide_index,
            frame_index: 0,
            file_path: file_path.into(),
            rect: size.full_rect(),
            kind: FrameKind::Slide,
        }
    }

    /// A per-frame crop entry.
    pub fn frame(
        slide_index: usize,
        frame_index: usize,
        file_path: impl Into<String>,
        rect: FrameRect,
    ) -> Self {
        Self {
            slide_index,
            frame_index,
            file_path: file_path.into(),
            rect,
            kind: FrameKind::Frame,
        }
    }
}

/// The persisted manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetadataFile {
    #[serde(default = "default_version")]
    pub schema_version: u32,
    pub slide_width_emu: i64,
    pub slide_height_emu: i64,
    #[serde(default)]
    pub frames: Vec<FrameScreenshotInfo>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl FrameMetadataFile {
    pub fn new(size: SlideSize, frames: Vec<FrameScreenshotInfo>) -> Self {
        Self {
            schema_version: MANIFEST_VERSION,
            slide_width_emu: size.width,
            slide_height_emu: size.height,
            frames,
        }
    }

    pub fn slide_size(&self) -> SlideSize {
        SlideSize::new(self.slide_width_emu, self.slide_height_emu)
    }

    /// Highest slide index referenced, or 0 when there are no entries.
    pub fn slide_count(&self) -> usize {
        self.frames.iter().map(|f| f.slide_index).max().unwrap_or(0)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Parse a manifest, accepting field names in any letter case.
    ///
    /// Fails as a whole if the document does not match the schema.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| Error::Manifest(e.to_string()))?;
        let value = canonicalize(value);
        serde_json::from_value(value).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Write the manifest to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)?;
        log::debug!("Wrote manifest with {} frames to {}", self.frames.len(), path.display());
        Ok(())
    }

    /// Read a manifest from `path`.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Rewrite object keys to their canonical spelling and lowercase `kind`.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                let key = FIELD_NAMES
                    .iter()
                    .find(|name| name.eq_ignore_ascii_case(&key))
                    .map(|name| name.to_string())
                    .unwrap_or(key);
                let inner = match (key.as_str(), inner) {
                    ("kind", Value::String(s)) => Value::String(s.to_ascii_lowercase()),
                    (_, other) => canonicalize(other),
                };
                out.insert(key, inner);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
