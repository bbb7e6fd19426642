//! Export pipelines built on external conversion tools.
//!
//! - [`Extractor`] decomposes a deck into `texts/`, `attachments/`,
//!   `screenshots/` and the `screenshots/frames.json` manifest.
//! - [`RebuildEngine`] turns a manifest back into a deck of placed images.
//! - [`LayoutReconstructor`] writes a responsive `index.html`.
//!
//! LibreOffice and poppler sit behind the [`Renderer`] and [`PageRasterizer`]
//! traits so the pipelines can run against fakes.

pub mod extract;
pub mod html;
pub mod rebuild;
pub mod renderer;
pub mod screenshot;
pub mod tool;

pub use extract::{BatchItem, BatchReport, ExtractionReport, Extractor};
pub use html::{HtmlReport, LayoutReconstructor};
pub use rebuild::{RebuildEngine, RebuildReport};
pub use renderer::{
    ConvertMode, ConvertRequest, PageRasterizer, PdftoppmRasterizer, Renderer, SofficeRenderer,
    ToolPaths,
};
pub use screenshot::{RasterStrategy, ScreenshotPipeline, ScreenshotSet};
