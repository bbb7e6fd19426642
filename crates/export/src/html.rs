//! Responsive HTML reconstruction of a deck.
//!
//! Each slide becomes a `<section>` with three parts: its resolved background
//! colour, an absolutely positioned layer of background images, and a
//! content layer of text blocks with flow images interleaved by vertical
//! position. Logos repeated across slides are hoisted into a page header.
//!
//! Every pixel length is emitted as `calc(<n>px * var(--s))`; a small script
//! sets `--s` per slide from its rendered width, so layouts follow the
//! viewport without re-rendering.

use crate::extract::{validate_source, ATTACHMENTS_DIR};
use crate::renderer::{ConvertMode, ConvertRequest, Renderer};
use crate::tool::scaled_timeout;
use deck_core::geometry::px_from_emu;
use deck_core::layout::{classify_images, flow_insert_index, group_paragraphs, hoist_logos, ParagraphGroup};
use deck_core::types::asset_file_name;
use deck_core::{
    HtmlImageBlock, HtmlOptions, HtmlParagraph, HtmlRun, HtmlSlide, HtmlTextBlock, ListKind,
    Result, Spacing,
};
use deck_pptx::xml::escape;
use deck_pptx::{collect_attachments, LayoutExtractor, PptxPackage};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

pub const INDEX_FILE_NAME: &str = "index.html";
pub const IMAGES_DIR: &str = "images";

const EXPORT_SECS_PER_SLIDE: Duration = Duration::from_secs(5);

static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("Invalid regex"));

static PAGE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<[a-z][a-z0-9]*\b[^>]*\bstyle\s*=\s*["'][^"']*(?:page-break-before\s*:\s*always|break-before\s*:\s*page)[^>]*>"#,
    )
    .expect("Invalid regex")
});

const STYLE: &str = r#":root { --s: 1; }
* { box-sizing: border-box; }
body { margin: 0; background: #f2f2f2; font-family: Calibri, Arial, sans-serif; }
.deck-header { display: flex; gap: 12px; align-items: center; padding: 8px 16px; background: #fff; border-bottom: 1px solid #ddd; }
.deck-header img { max-height: 48px; width: auto; }
.deck { display: flex; flex-direction: column; align-items: center; gap: 24px; padding: 24px 12px; }
.slide { position: relative; width: 100%; overflow: hidden; box-shadow: 0 1px 4px rgba(0, 0, 0, 0.2); }
.slide-bg { position: absolute; inset: 0; z-index: 0; pointer-events: none; }
.slide-bg img { position: absolute; object-fit: cover; }
.slide-content { position: relative; z-index: 1; }
.block p, .block li { margin: 0; }
.block ul, .block ol { margin: 0; padding-left: 1.2em; }
.flow { display: block; }
.slide-export { overflow: hidden; }
"#;

const SCALE_SCRIPT: &str = r#"(function () {
  function rescale() {
    document.querySelectorAll('.slide[data-width]').forEach(function (slide) {
      var authored = parseFloat(slide.getAttribute('data-width'));
      if (authored > 0) {
        slide.style.setProperty('--s', String(slide.clientWidth / authored));
      }
    });
  }
  window.addEventListener('resize', rescale);
  document.addEventListener('DOMContentLoaded', rescale);
  rescale();
})();"#;

/// What an HTML export wrote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlReport {
    pub index_path: PathBuf,
    pub slide_count: usize,
    pub images_written: usize,
    pub logos_hoisted: usize,
    pub attachments: usize,
}

/// Builds `index.html`, `images/` and `attachments/` from a deck.
pub struct LayoutReconstructor<'a> {
    renderer: &'a dyn Renderer,
    options: HtmlOptions,
}

impl<'a> LayoutReconstructor<'a> {
    pub fn new(renderer: &'a dyn Renderer, options: HtmlOptions) -> Self {
        Self { renderer, options }
    }

    pub fn render(&self, source: &Path, output_dir: &Path) -> Result<HtmlReport> {
        validate_source(source)?;
        let package = PptxPackage::open(source)?;
        let mut layout = LayoutExtractor::new(&package)?.extract()?;
        let slide_count = layout.slides.len();
        log::info!("Rendering {} slide(s) of {} as HTML", slide_count, source.display());

        for slide in &mut layout.slides {
            classify_images(slide);
        }
        let logos = hoist_logos(&mut layout.slides);

        let fragments = if self.options.include_export && slide_count > 0 {
            let html = self.export_html(source, slide_count)?;
            split_fragments(&html, slide_count)
        } else {
            vec![String::new(); slide_count]
        };

        fs::create_dir_all(output_dir)?;

        let mut images_written = 0;
        if !layout.assets.is_empty() {
            let images_dir = output_dir.join(IMAGES_DIR);
            fs::create_dir_all(&images_dir)?;
            for (hash, asset) in &layout.assets {
                fs::write(images_dir.join(asset_file_name(hash, &asset.extension)), &asset.data)?;
                images_written += 1;
            }
        }

        let mut attachments = 0;
        if self.options.attachments {
            let parts = collect_attachments(&package)?;
            if !parts.is_empty() {
                let dir = output_dir.join(ATTACHMENTS_DIR);
                fs::create_dir_all(&dir)?;
                for attachment in &parts {
                    fs::write(dir.join(&attachment.file_name), attachment.data)?;
                }
                attachments = parts.len();
            }
        }

        let title = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let document = render_document(&title, &layout.slides, &logos, &fragments);
        let index_path = output_dir.join(INDEX_FILE_NAME);
        fs::write(&index_path, document)?;

        Ok(HtmlReport {
            index_path,
            slide_count,
            images_written,
            logos_hoisted: logos.len(),
            attachments,
        })
    }

    fn export_html(&self, source: &Path, slide_count: usize) -> Result<String> {
        let work = tempfile::Builder::new().prefix("deck-html-").tempdir()?;
        let request = ConvertRequest::new(source, work.path(), ConvertMode::Html)
            .with_timeout(scaled_timeout(slide_count, EXPORT_SECS_PER_SLIDE));
        let path = self.renderer.convert(&request)?;
        let bytes = fs::read(&path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Split an exported document into exactly `slide_count` body fragments.
///
/// Fragments start at forced page-break markers. Missing fragments are
/// empty; any overflow is appended to the last one.
pub fn split_fragments(html: &str, slide_count: usize) -> Vec<String> {
    if slide_count == 0 {
        return Vec::new();
    }
    let body = BODY_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(html);

    let mut starts: Vec<usize> = PAGE_BREAK_RE.find_iter(body).map(|m| m.start()).collect();
    let has_markers = !starts.is_empty();
    starts.insert(0, 0);

    let mut pieces: Vec<String> = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            body[start..end].to_string()
        })
        .collect();

    if has_markers && pieces.first().is_some_and(|p| p.trim().is_empty()) {
        pieces.remove(0);
    }

    if pieces.len() > slide_count {
        let overflow: String = pieces.drain(slide_count..).collect();
        if let Some(last) = pieces.last_mut() {
            last.push_str(&overflow);
        }
    }
    pieces.resize(slide_count, String::new());
    pieces
}

/// Assemble the complete HTML page.
pub fn render_document(
    title: &str,
    slides: &[HtmlSlide],
    logos: &[HtmlImageBlock],
    fragments: &[String],
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n",
        escape(title),
        STYLE
    );

    if !logos.is_empty() {
        out.push_str("<header class=\"deck-header\">\n");
        for logo in logos {
            let _ = writeln!(
                out,
                "<img class=\"logo\" src=\"{}/{}\" alt=\"\">",
                IMAGES_DIR,
                logo.asset_name()
            );
        }
        out.push_str("</header>\n");
    }

    out.push_str("<main class=\"deck\">\n");
    for (idx, slide) in slides.iter().enumerate() {
        let fragment = fragments.get(idx).map(String::as_str).unwrap_or("");
        render_slide(&mut out, slide, fragment);
    }
    out.push_str("</main>\n");

    let _ = write!(out, "<script>\n{}\n</script>\n</body>\n</html>\n", SCALE_SCRIPT);
    out
}

fn render_slide(out: &mut String, slide: &HtmlSlide, fragment: &str) {
    let width = slide.size.width_px();
    let height = slide.size.height_px();
    let _ = writeln!(
        out,
        "<section class=\"slide\" id=\"slide-{}\" data-width=\"{}\" style=\"max-width: {}px; min-height: {}; background-color: {};\">",
        slide.number,
        num(width),
        num(width),
        scaled(height),
        slide.background_color
    );

    let backgrounds: Vec<&HtmlImageBlock> = slide.background_images().collect();
    if !backgrounds.is_empty() {
        out.push_str("<div class=\"slide-bg\">\n");
        for image in backgrounds {
            let _ = writeln!(
                out,
                "<img src=\"{}/{}\" alt=\"\" style=\"left: {}; top: {}; width: {}; height: {};\">",
                IMAGES_DIR,
                image.asset_name(),
                scaled(px_from_emu(image.rect.x)),
                scaled(px_from_emu(image.rect.y)),
                scaled(px_from_emu(image.rect.cx)),
                scaled(px_from_emu(image.rect.cy))
            );
        }
        out.push_str("</div>\n");
    }

    out.push_str("<div class=\"slide-content\">\n");
    let mut blocks: Vec<&HtmlTextBlock> = slide.text_blocks.iter().filter(|b| !b.is_empty()).collect();
    blocks.sort_by_key(|b| (b.rect.y, b.rect.x));

    if !fragment.trim().is_empty() {
        let _ = writeln!(out, "<div class=\"slide-export\">{}</div>", fragment);
    }

    // Flow images keyed by the block index they precede.
    let mut flow: Vec<(usize, &HtmlImageBlock)> = slide
        .flow_images()
        .map(|image| (flow_insert_index(image.rect, slide.size, blocks.len()), image))
        .collect();
    flow.sort_by_key(|(index, image)| (*index, image.rect.y));

    let mut pending = flow.iter().peekable();
    for (idx, block) in blocks.iter().enumerate() {
        while let Some((_, image)) = pending.next_if(|(at, _)| *at <= idx) {
            render_flow_image(out, image);
        }
        render_block(out, block);
    }
    for (_, image) in pending {
        render_flow_image(out, image);
    }

    out.push_str("</div>\n</section>\n");
}

fn render_flow_image(out: &mut String, image: &HtmlImageBlock) {
    let _ = writeln!(
        out,
        "<img class=\"flow\" src=\"{}/{}\" alt=\"\" style=\"margin-left: {}; width: {}; height: {};\">",
        IMAGES_DIR,
        image.asset_name(),
        scaled(px_from_emu(image.rect.x.max(0))),
        scaled(px_from_emu(image.rect.cx)),
        scaled(px_from_emu(image.rect.cy))
    );
}

fn render_block(out: &mut String, block: &HtmlTextBlock) {
    let _ = writeln!(
        out,
        "<div class=\"block\" style=\"margin-left: {}; width: {};\">",
        scaled(px_from_emu(block.rect.x.max(0))),
        scaled(px_from_emu(block.rect.cx))
    );

    for group in group_paragraphs(&block.paragraphs) {
        match group {
            ParagraphGroup::Plain(idx) => {
                let paragraph = &block.paragraphs[idx];
                let _ = writeln!(
                    out,
                    "<p style=\"{}\">{}</p>",
                    paragraph_style(paragraph),
                    runs_html(&paragraph.runs)
                );
            }
            ParagraphGroup::List { kind, items } => {
                let tag = match kind {
                    ListKind::Ordered => "ol",
                    ListKind::Unordered => "ul",
                };
                let _ = writeln!(out, "<{}>", tag);
                for idx in items {
                    let paragraph = &block.paragraphs[idx];
                    let _ = writeln!(
                        out,
                        "<li style=\"{}\">{}</li>",
                        paragraph_style(paragraph),
                        runs_html(&paragraph.runs)
                    );
                }
                let _ = writeln!(out, "</{}>", tag);
            }
        }
    }

    out.push_str("</div>\n");
}

/// Inline CSS for one paragraph.
pub fn paragraph_style(paragraph: &HtmlParagraph) -> String {
    let mut css = Vec::new();
    if let Some(align) = paragraph.align {
        css.push(format!("text-align: {}", align.as_css()));
    }
    let indent = paragraph.indent_px();
    if indent > 0.0 {
        css.push(format!("margin-left: {}", scaled(indent)));
    }
    if let Some(spacing) = paragraph.line_spacing {
        let value = match spacing {
            Spacing::Px(px) => scaled(px),
            Spacing::Relative(ratio) => num(ratio),
        };
        css.push(format!("line-height: {}", value));
    }
    for (property, spacing) in [
        ("margin-top", paragraph.space_before),
        ("margin-bottom", paragraph.space_after),
    ] {
        if let Some(spacing) = spacing {
            css.push(format!("{}: {}", property, spacing_length(spacing)));
        }
    }
    css.join("; ")
}

fn spacing_length(spacing: Spacing) -> String {
    match spacing {
        Spacing::Px(px) => scaled(px),
        Spacing::Relative(ratio) => format!("{}em", num(ratio)),
    }
}

fn runs_html(runs: &[HtmlRun]) -> String {
    runs.iter()
        .map(|run| format!("<span style=\"{}\">{}</span>", run_style(run), escape(&run.text)))
        .collect()
}

/// Inline CSS for one run.
pub fn run_style(run: &HtmlRun) -> String {
    let style = &run.style;
    let mut css = Vec::new();
    if let Some(family) = &style.font_family {
        let clean: String = family
            .chars()
            .filter(|c| !matches!(c, '\'' | '"' | ';' | '<' | '>' | '&' | '\\'))
            .collect();
        if !clean.is_empty() {
            css.push(format!("font-family: '{}'", clean));
        }
    }
    if let Some(size) = style.size_px {
        css.push(format!("font-size: {}", scaled(size)));
    }
    css.push(format!("color: {}", style.color));
    if style.bold {
        css.push("font-weight: bold".to_string());
    }
    if style.italic {
        css.push("font-style: italic".to_string());
    }
    if style.underline {
        css.push("text-decoration: underline".to_string());
    }
    css.join("; ")
}

/// A pixel length that follows the slide's scale factor.
fn scaled(px: f64) -> String {
    format!("calc({}px * var(--s))", num(px))
}

/// Compact decimal: at most two places, no trailing zeros.
fn num(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
