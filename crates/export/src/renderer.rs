//! External document renderer and PDF page rasterizer.
//!
//! Everything above this module talks to the two narrow traits [`Renderer`]
//! and [`PageRasterizer`]. The real implementations drive LibreOffice
//! (`soffice`) and poppler (`pdftoppm`, `pdfinfo`).

use crate::tool::{probe, ToolCommand, MIN_TIMEOUT};
use deck_core::{Error, Result};
use image::DynamicImage;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static PAGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").expect("Invalid regex"));

/// Output kind requested from the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertMode {
    Pdf,
    Html,
    Png,
}

impl ConvertMode {
    /// Extension of the primary output file (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            ConvertMode::Pdf => "pdf",
            ConvertMode::Html => "html",
            ConvertMode::Png => "png",
        }
    }
}

/// One conversion job.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub mode: ConvertMode,
    pub timeout: Duration,
    /// Private renderer profile; required when conversions run concurrently.
    pub profile_dir: Option<PathBuf>,
}

impl ConvertRequest {
    pub fn new(input: impl Into<PathBuf>, out_dir: impl Into<PathBuf>, mode: ConvertMode) -> Self {
        Self {
            input: input.into(),
            out_dir: out_dir.into(),
            mode,
            timeout: MIN_TIMEOUT,
            profile_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_profile_dir(mut self, profile_dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(profile_dir.into());
        self
    }

    /// Where the primary output is expected: `<out_dir>/<input stem>.<ext>`.
    pub fn expected_output(&self) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.out_dir
            .join(format!("{}.{}", stem, self.mode.extension()))
    }
}

/// Converts a document into PDF, HTML or a raster image.
pub trait Renderer: Send + Sync {
    /// Run the conversion; returns the path of the single primary output.
    fn convert(&self, request: &ConvertRequest) -> Result<PathBuf>;
}

/// Renders PDF pages to bitmaps.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, pdf: &Path) -> Result<usize>;

    /// Render the 0-based `page_index` at `dpi` in both directions.
    fn render_page(&self, pdf: &Path, page_index: usize, dpi: u32) -> Result<DynamicImage>;
}

/// Executable locations for the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub soffice: PathBuf,
    pub pdftoppm: PathBuf,
    pub pdfinfo: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            soffice: PathBuf::from("soffice"),
            pdftoppm: PathBuf::from("pdftoppm"),
            pdfinfo: PathBuf::from("pdfinfo"),
        }
    }
}

impl ToolPaths {
    pub fn renderer(&self) -> SofficeRenderer {
        SofficeRenderer::new(&self.soffice)
    }

    pub fn rasterizer(&self) -> PdftoppmRasterizer {
        PdftoppmRasterizer::new(&self.pdftoppm, &self.pdfinfo)
    }
}

/// LibreOffice headless conversion.
#[derive(Debug, Clone)]
pub struct SofficeRenderer {
    program: PathBuf,
}

impl SofficeRenderer {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    pub fn is_available(&self) -> bool {
        probe(&self.program, "--version")
    }
}

impl Renderer for SofficeRenderer {
    fn convert(&self, request: &ConvertRequest) -> Result<PathBuf> {
        fs::create_dir_all(&request.out_dir)?;

        let mut command = ToolCommand::new("soffice", &self.program).timeout(request.timeout);
        if let Some(profile) = &request.profile_dir {
            fs::create_dir_all(profile)?;
            command = command.arg(format!("-env:UserInstallation={}", file_url(profile)?));
        }
        command = command
            .args(["--headless", "--norestore", "--nologo", "--convert-to"])
            .arg(request.mode.extension())
            .arg("--outdir")
            .arg(request.out_dir.as_os_str())
            .arg(request.input.as_os_str());

        let output = command.run()?;
        find_output(request).ok_or_else(|| Error::ToolFailed {
            tool: "soffice".to_string(),
            code: 0,
            stderr: format!(
                "no .{} output produced ({})",
                request.mode.extension(),
                output.stderr.trim()
            ),
        })
    }
}

/// The expected output, or any file with the mode's extension in `out_dir`.
fn find_output(request: &ConvertRequest) -> Option<PathBuf> {
    let expected = request.expected_output();
    if expected.is_file() {
        return Some(expected);
    }
    let wanted = request.mode.extension();
    let mut candidates: Vec<PathBuf> = fs::read_dir(&request.out_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn file_url(dir: &Path) -> Result<String> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let path = absolute.to_string_lossy().replace('\\', "/");
    let path = path.replace(' ', "%20");
    if path.starts_with('/') {
        Ok(format!("file://{}", path))
    } else {
        Ok(format!("file:///{}", path))
    }
}

/// poppler-based rasterizer.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pdftoppm: PathBuf,
    pdfinfo: PathBuf,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(pdftoppm: impl AsRef<Path>, pdfinfo: impl AsRef<Path>) -> Self {
        Self {
            pdftoppm: pdftoppm.as_ref().to_path_buf(),
            pdfinfo: pdfinfo.as_ref().to_path_buf(),
            timeout: MIN_TIMEOUT,
        }
    }

    pub fn is_available(&self) -> bool {
        probe(&self.pdftoppm, "-v") && probe(&self.pdfinfo, "-v")
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<usize> {
        let output = ToolCommand::new("pdfinfo", &self.pdfinfo)
            .arg(pdf.as_os_str())
            .timeout(self.timeout)
            .run()?;
        parse_page_count(&output.stdout).ok_or_else(|| Error::ToolFailed {
            tool: "pdfinfo".to_string(),
            code: 0,
            stderr: "no page count in output".to_string(),
        })
    }

    fn render_page(&self, pdf: &Path, page_index: usize, dpi: u32) -> Result<DynamicImage> {
        let work = tempfile::Builder::new().prefix("deck-page-").tempdir()?;
        let prefix = work.path().join("page");
        let page = (page_index + 1).to_string();
        let dpi = dpi.to_string();

        ToolCommand::new("pdftoppm", &self.pdftoppm)
            .args(["-png", "-r", dpi.as_str(), "-f", page.as_str(), "-l", page.as_str()])
            .arg("-singlefile")
            .arg(pdf.as_os_str())
            .arg(prefix.as_os_str())
            .timeout(self.timeout)
            .run()?;

        let png = prefix.with_extension("png");
        image::open(&png).map_err(|e| {
            Error::ImageError(format!("Failed to decode page {}: {}", page_index + 1, e))
        })
    }
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    PAGES_RE
        .captures(pdfinfo_output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let out = "Title:          deck\nProducer:       LibreOffice\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(out), Some(12));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }

    #[test]
    fn test_expected_output() {
        let req = ConvertRequest::new("/in/My Deck.pptx", "/out", ConvertMode::Pdf);
        assert_eq!(req.expected_output(), PathBuf::from("/out/My Deck.pdf"));
        assert_eq!(req.timeout, MIN_TIMEOUT);
    }

    #[test]
    fn test_file_url() {
        assert_eq!(
            file_url(Path::new("/tmp/a b/profile")).unwrap(),
            "file:///tmp/a%20b/profile"
        );
    }

    #[test]
    fn test_find_output_falls_back_to_any_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("renamed.html"), "<html/>").unwrap();
        let req = ConvertRequest::new("deck.pptx", dir.path(), ConvertMode::Html);
        assert_eq!(find_output(&req), Some(dir.path().join("renamed.html")));

        let pdf = ConvertRequest::new("deck.pptx", dir.path(), ConvertMode::Pdf);
        assert_eq!(find_output(&pdf), None);
    }

    #[test]
    fn test_default_tool_paths() {
        let paths = ToolPaths::default();
        assert_eq!(paths.soffice, PathBuf::from("soffice"));
        assert!(!ToolPaths {
            soffice: PathBuf::from("/nonexistent/soffice"),
            ..paths
        }
        .renderer()
        .is_available());
    }
}
