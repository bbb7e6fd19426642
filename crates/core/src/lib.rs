//! Core types for slide deck decomposition: EMU/pixel geometry, the frame
//! manifest shared by extraction and rebuild, layout heuristics for HTML
//! reconstruction, and the error taxonomy.

pub mod error;
pub mod geometry;
pub mod layout;
pub mod manifest;
pub mod normalize;
pub mod options;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use geometry::{FrameRect, PixelRect, SlideSize};
pub use manifest::{FrameKind, FrameMetadataFile, FrameScreenshotInfo, MANIFEST_FILE_NAME};
pub use normalize::TextNormalizer;
pub use options::{ExtractOptions, HtmlOptions, RebuildOptions, ScreenshotOptions};
pub use types::{
    Bullet, HtmlImageBlock, HtmlParagraph, HtmlRun, HtmlSlide, HtmlTextBlock, ListKind, RunStyle,
    Spacing, TextAlign,
};
