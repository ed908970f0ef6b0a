//! Error types for the md2pdf-client library.
//!
//! Two error types reflect two distinct failure modes:
//!
//! * [`ValidationError`]: **local**, the input was rejected before any
//!   request was built (no input, wrong extension, file too large). Shown
//!   inline by the front-end and never retried.
//!
//! * [`Md2PdfError`]: **fatal** for a library call: transport failure,
//!   server-declared error, cancellation, or a local I/O problem while
//!   reading an input file or writing a downloaded PDF.
//!
//! Cancellation has its own variant so callers never confuse a user-intended
//! stop with a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Input rejected locally, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither a file nor non-blank text was provided.
    #[error("Please upload a file or enter some Markdown text.")]
    NoInput,

    /// The file extension is not one of `md`, `txt`, `markdown`.
    #[error("Invalid file type. Please upload a .md, .txt, or .markdown file.")]
    UnsupportedFileType { name: String },

    /// The file is larger than the upload limit.
    #[error("File too large. Maximum size is 16MB.")]
    FileTooLarge { name: String, size: u64 },
}

/// All fatal errors returned by the md2pdf-client library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input failed local validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An input file could not be read.
    #[error("Failed to read input file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// No usable response from the service (unreachable, timed out, body not JSON).
    #[error("Network error: {detail}")]
    Transport { detail: String },

    /// The service answered with `success: false`.
    #[error("Conversion failed: {message}")]
    Server { message: String },

    /// The user cancelled the conversion.
    #[error("Conversion cancelled by user")]
    Cancelled,

    // ── Download errors ───────────────────────────────────────────────────
    /// The PDF at `url` could not be fetched.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// True for the user-intended cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Md2PdfError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::NoInput.to_string(),
            "Please upload a file or enter some Markdown text."
        );
        let e = ValidationError::FileTooLarge {
            name: "big.md".into(),
            size: 17 * 1024 * 1024,
        };
        assert!(e.to_string().contains("16MB"));
    }

    #[test]
    fn validation_converts_transparently() {
        let e: Md2PdfError = ValidationError::UnsupportedFileType {
            name: "virus.exe".into(),
        }
        .into();
        assert!(e.to_string().starts_with("Invalid file type"), "got: {e}");
        assert!(!e.is_cancelled());
    }

    #[test]
    fn server_error_keeps_message() {
        let e = Md2PdfError::Server {
            message: "Pandoc failed with return code 43".into(),
        };
        assert!(e.to_string().contains("return code 43"));
    }

    #[test]
    fn cancelled_is_distinct() {
        assert!(Md2PdfError::Cancelled.is_cancelled());
        assert!(!Md2PdfError::Transport {
            detail: "connection refused".into()
        }
        .is_cancelled());
    }
}
