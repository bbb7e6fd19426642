//! PPTX (Office Open XML) package backend.
//!
//! A `.pptx` file is a ZIP archive of XML parts linked by relationship files.
//! This crate reads those parts into memory and derives what the export
//! pipelines need from them: slide order and size, frame rectangles, slide
//! text, attachments and a styled layout model. It can also write packages,
//! either a copy reduced to one slide or a new deck built from images.

pub mod frames;
pub mod isolate;
pub mod media;
pub mod package;
pub mod styled;
pub mod text;
pub mod theme;
pub mod writer;
pub mod xml;

pub use frames::FrameExtractor;
pub use isolate::isolate_slide;
pub use media::{collect_attachments, content_hash, Attachment};
pub use package::{ensure_pptx_extension, PptxPackage, Relationship};
pub use styled::{DeckLayout, ImageAsset, LayoutExtractor};
pub use text::{extract_slide_texts, slide_text_file_name};
pub use theme::ThemeColors;
pub use writer::{write_zip, DeckWriter};
pub use xml::XmlElement;
