//! Error types for slide deck decomposition, rebuild and HTML export.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decomposing, rebuilding or rendering a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Empty or malformed input, or a missing required field.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The file format is not supported.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// A source document or manifest does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The output path already exists and overwriting was not requested.
    #[error("Output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// Invalid or corrupted package.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// Raster decode, crop or encode error.
    #[error("Image error: {0}")]
    ImageError(String),

    /// An external tool could not be started.
    #[error("Failed to launch {tool}: {reason}")]
    ToolLaunch { tool: String, reason: String },

    /// An external tool exited with a non-zero status.
    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// An external tool exceeded its wall-clock budget and was killed.
    #[error("{tool} timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    /// The frame manifest could not be parsed.
    #[error("Malformed frame manifest: {0}")]
    Manifest(String),
}

/// Coarse classification of an [`Error`]; the CLI maps it to an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    ExternalTool,
    Manifest,
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) | Error::UnsupportedFormat(_) | Error::OutputExists(_) => {
                ErrorCategory::Validation
            }
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::ToolLaunch { .. } | Error::ToolFailed { .. } | Error::ToolTimeout { .. } => {
                ErrorCategory::ExternalTool
            }
            Error::Manifest(_) => ErrorCategory::Manifest,
            Error::IoError(_)
            | Error::CorruptedFile(_)
            | Error::ZipError(_)
            | Error::XmlError(_)
            | Error::ImageError(_) => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::Validation("empty".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::NotFound(PathBuf::from("a.pptx")).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::ToolTimeout {
                tool: "soffice".into(),
                seconds: 60
            }
            .category(),
            ErrorCategory::ExternalTool
        );
        assert_eq!(
            Error::Manifest("eof".into()).category(),
            ErrorCategory::Manifest
        );
    }

    #[test]
    fn test_input_and_infrastructure_categories() {
        assert_eq!(
            Error::UnsupportedFormat("key".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::OutputExists(PathBuf::from("out.pptx")).category(),
            ErrorCategory::Validation
        );
        assert_eq!(Error::ZipError("bad".into()).category(), ErrorCategory::Internal);
        assert_eq!(
            Error::ToolFailed {
                tool: "soffice".into(),
                code: 1,
                stderr: String::new()
            }
            .category(),
            ErrorCategory::ExternalTool
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound(PathBuf::from("/tmp/missing.pptx"));
        assert_eq!(err.to_string(), "File not found: /tmp/missing.pptx");
    }
}
