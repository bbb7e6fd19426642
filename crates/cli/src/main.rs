//! CLI tool for decomposing, rebuilding and rendering PowerPoint decks.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use deck_core::{ErrorCategory, ExtractOptions, HtmlOptions, RebuildOptions, ScreenshotOptions};
use deck_export::{Extractor, LayoutReconstructor, RebuildEngine, ToolPaths};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for invalid input or an unsupported file.
const EXIT_VALIDATION: u8 = 2;
/// Exit code when a source document or manifest is missing.
const EXIT_NOT_FOUND: u8 = 3;
/// Exit code when LibreOffice or poppler fails, can't start or times out.
const EXIT_TOOL: u8 = 4;
/// Exit code for an unreadable manifest.
const EXIT_MANIFEST: u8 = 5;

/// Decompose .pptx decks into texts, attachments and screenshots, rebuild
/// decks from screenshot manifests, or render them as responsive HTML.
#[derive(Parser, Debug)]
#[command(name = "deckctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    tools: ToolArgs,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct ToolArgs {
    /// LibreOffice executable
    #[arg(long, global = true, env = "DECK_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// poppler pdftoppm executable
    #[arg(long, global = true, env = "DECK_PDFTOPPM", default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// poppler pdfinfo executable
    #[arg(long, global = true, env = "DECK_PDFINFO", default_value = "pdfinfo")]
    pdfinfo: PathBuf,
}

impl From<&ToolArgs> for ToolPaths {
    fn from(args: &ToolArgs) -> Self {
        ToolPaths {
            soffice: args.soffice.clone(),
            pdftoppm: args.pdftoppm.clone(),
            pdfinfo: args.pdfinfo.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract texts, attachments, screenshots and frames.json
    Extract(ExtractArgs),
    /// Rebuild a deck from a frames.json manifest
    Rebuild(RebuildArgs),
    /// Render a deck as index.html with images and attachments
    Html(HtmlArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input .pptx file(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory; with several inputs each gets a subdirectory
    #[arg(short, long)]
    output: PathBuf,

    /// Crop one screenshot per shape frame instead of one per slide
    #[arg(long)]
    per_frame: bool,

    /// Skip screenshots entirely
    #[arg(long)]
    no_screenshots: bool,

    /// Skip texts/
    #[arg(long)]
    no_texts: bool,

    /// Skip attachments/
    #[arg(long)]
    no_attachments: bool,

    /// Raster DPI (72-300); derived from the size bounds when omitted
    #[arg(long)]
    dpi: Option<u32>,

    /// Maximum screenshot width in pixels
    #[arg(long)]
    max_width: Option<u32>,

    /// Maximum screenshot height in pixels
    #[arg(long)]
    max_height: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(long, default_value = "85")]
    quality: u8,

    /// Allow crops to be enlarged up to the size bounds
    #[arg(long)]
    upscale: bool,

    /// Workers for per-slide rendering (default: CPU count)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

#[derive(Args, Debug)]
struct RebuildArgs {
    /// Path to frames.json
    manifest: PathBuf,

    /// Output .pptx path
    #[arg(short, long)]
    output: PathBuf,

    /// Replace an existing output file
    #[arg(long)]
    overwrite: bool,

    /// Use whole-slide screenshots for slides without frame crops
    #[arg(long)]
    slide_fallback: bool,
}

#[derive(Args, Debug)]
struct HtmlArgs {
    /// Input .pptx file
    input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Skip attachments/
    #[arg(long)]
    no_attachments: bool,

    /// Don't run the external HTML export
    #[arg(long)]
    no_export: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let tools = ToolPaths::from(&cli.tools);
    let result = match &cli.command {
        Command::Extract(args) => run_extract(args, &tools),
        Command::Rebuild(args) => run_rebuild(args),
        Command::Html(args) => run_html(args, &tools),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Map a failure onto its exit code by error category.
fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<deck_core::Error>().map(deck_core::Error::category) {
        Some(ErrorCategory::Validation) => EXIT_VALIDATION,
        Some(ErrorCategory::NotFound) => EXIT_NOT_FOUND,
        Some(ErrorCategory::ExternalTool) => EXIT_TOOL,
        Some(ErrorCategory::Manifest) => EXIT_MANIFEST,
        Some(ErrorCategory::Internal) | None => 1,
    }
}

fn run_extract(args: &ExtractArgs, tools: &ToolPaths) -> Result<()> {
    let mut screenshots = ScreenshotOptions::default()
        .with_enabled(!args.no_screenshots)
        .with_per_frame(args.per_frame)
        .with_dpi(args.dpi)
        .with_max_size(args.max_width, args.max_height)
        .with_jpeg_quality(args.quality)
        .with_allow_upscale(args.upscale);
    if let Some(jobs) = args.jobs {
        screenshots = screenshots.with_parallelism(jobs);
    }
    let options = ExtractOptions::default()
        .with_screenshots(screenshots)
        .with_texts(!args.no_texts)
        .with_attachments(!args.no_attachments);

    let renderer = tools.renderer();
    let rasterizer = tools.rasterizer();
    if options.screenshots.enabled {
        if !renderer.is_available() {
            log::warn!("{} does not appear to be runnable", tools.soffice.display());
        }
        if !rasterizer.is_available() {
            log::warn!("{} does not appear to be runnable", tools.pdftoppm.display());
        }
    }
    let extractor = Extractor::new(&renderer, &rasterizer, options);

    if let [input] = args.input.as_slice() {
        let report = extractor
            .extract_document(input, &args.output)
            .with_context(|| format!("Failed to extract {}", input.display()))?;
        return print_json(&report);
    }

    let report = extractor.extract_batch(&args.input, &args.output);
    print_json(&report)?;
    if report.failed > 0 {
        return Err(anyhow!(
            "{} of {} document(s) failed",
            report.failed,
            report.requested
        ));
    }
    Ok(())
}

fn run_rebuild(args: &RebuildArgs) -> Result<()> {
    let options = RebuildOptions::default()
        .with_overwrite(args.overwrite)
        .with_slide_fallback(args.slide_fallback);
    let report = RebuildEngine::new(options)
        .rebuild(&args.manifest, &args.output)
        .with_context(|| format!("Failed to rebuild from {}", args.manifest.display()))?;
    print_json(&report)
}

fn run_html(args: &HtmlArgs, tools: &ToolPaths) -> Result<()> {
    let options = HtmlOptions::default()
        .with_attachments(!args.no_attachments)
        .with_include_export(!args.no_export);
    let renderer = tools.renderer();
    let report = LayoutReconstructor::new(&renderer, options)
        .render(&args.input, &args.output)
        .with_context(|| format!("Failed to render {}", args.input.display()))?;
    print_json(&report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "deckctl", "extract", "a.pptx", "b.pptx", "-o", "out", "--per-frame", "--max-width",
            "1280", "-j", "4",
        ])
        .unwrap();
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.input.len(), 2);
                assert!(args.per_frame);
                assert_eq!(args.max_width, Some(1280));
                assert_eq!(args.jobs, Some(4));
                assert_eq!(args.quality, 85);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rebuild_and_tool_override() {
        let cli = Cli::try_parse_from([
            "deckctl",
            "rebuild",
            "shots/frames.json",
            "-o",
            "deck.pptx",
            "--slide-fallback",
            "--soffice",
            "/opt/lo/soffice",
        ])
        .unwrap();
        assert_eq!(ToolPaths::from(&cli.tools).soffice, PathBuf::from("/opt/lo/soffice"));
        match cli.command {
            Command::Rebuild(args) => {
                assert!(args.slide_fallback);
                assert!(!args.overwrite);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_exit_codes_follow_error_category() {
        let not_found = Err::<(), _>(deck_core::Error::NotFound(PathBuf::from("deck.pptx")))
            .context("Failed to extract deck.pptx")
            .unwrap_err();
        assert_eq!(exit_code(&not_found), EXIT_NOT_FOUND);

        let bad_ext = anyhow::Error::new(deck_core::Error::UnsupportedFormat("key".into()));
        assert_eq!(exit_code(&bad_ext), EXIT_VALIDATION);

        let timeout = anyhow::Error::new(deck_core::Error::ToolTimeout {
            tool: "soffice".into(),
            seconds: 60,
        });
        assert_eq!(exit_code(&timeout), EXIT_TOOL);

        let manifest = anyhow::Error::new(deck_core::Error::Manifest("eof".into()));
        assert_eq!(exit_code(&manifest), EXIT_MANIFEST);

        assert_eq!(exit_code(&anyhow!("2 of 3 document(s) failed")), 1);
    }

    #[test]
    fn test_extract_requires_output() {
        assert!(Cli::try_parse_from(["deckctl", "extract", "a.pptx"]).is_err());
    }
}
