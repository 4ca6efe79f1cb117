//! Error types for the md2pdf library.
//!
//! A single enum, [`Md2PdfError`], covers every way a conversion can fail.
//! Variants are grouped the way a user experiences them:
//!
//! * **Input-not-found**: the Markdown source cannot be opened
//!   ([`Md2PdfError::FileNotFound`], [`Md2PdfError::PermissionDenied`]).
//!   A missing stylesheet is not in this list: it degrades
//!   to an empty style block instead of failing.
//!
//! * **Conversion failure**: everything after the input was read: Markdown
//!   formatting, output directory creation, browser discovery and printing.
//!
//! Usage errors never reach the library; the CLI rejects them before any
//! file I/O happens.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input exists but is not UTF-8 text.
    #[error("'{path}' is not valid UTF-8 text")]
    InvalidUtf8 { path: PathBuf },

    // ── Compose errors ────────────────────────────────────────────────────
    /// comrak failed to format the document tree.
    #[error("Markdown conversion failed: {message}")]
    Markdown { message: String },

    /// syntect failed on a fenced code block.
    #[error("Syntax highlighting failed for language '{language}': {message}")]
    Highlighting { language: String, message: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The requested output path has no file-name component.
    #[error("Output path '{path}' does not name a file")]
    InvalidOutputPath { path: PathBuf },

    /// Could not create the date-stamped output directory.
    #[error("Failed to create output directory '{path}'")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create, write or persist the output file.
    #[error("Failed to write output file '{path}'")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Browser errors ────────────────────────────────────────────────────
    /// No usable Chrome/Chromium executable.
    #[error("{0}")]
    BrowserNotFound(#[from] chrome_locate::LocateError),

    /// The browser executable could not be spawned.
    #[error("Failed to launch browser '{path}'")]
    BrowserLaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The browser ran but exited unsuccessfully.
    #[error("Browser exited with {status}: {stderr}")]
    BrowserFailed { status: String, stderr: String },

    /// The browser did not finish within the configured timeout.
    #[error("Browser did not finish printing within {secs}s")]
    RenderTimeout { secs: u64 },

    /// The browser finished but left no usable PDF behind.
    #[error("Browser produced no valid PDF: {detail}")]
    InvalidPdf { detail: String },

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
    /// `true` for the input-not-found family of errors.
    pub fn is_input_not_found(&self) -> bool {
        matches!(
            self,
            Md2PdfError::FileNotFound { .. } | Md2PdfError::PermissionDenied { .. }
        )
    }

    /// Process exit status used by the CLI for this error.
    ///
    /// `2` is reserved for usage errors, which clap reports on its own.
    pub fn exit_code(&self) -> u8 {
        if self.is_input_not_found() {
            3
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_names_path() {
        let e = Md2PdfError::FileNotFound {
            path: PathBuf::from("docs/missing.md"),
        };
        assert!(e.to_string().contains("docs/missing.md"), "got: {e}");
        assert!(e.is_input_not_found());
        assert_eq!(e.exit_code(), 3);
    }

    #[test]
    fn conversion_failures_exit_one() {
        let e = Md2PdfError::RenderTimeout { secs: 30 };
        assert!(!e.is_input_not_found());
        assert_eq!(e.exit_code(), 1);
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = Md2PdfError::OutputWriteFailed {
            path: PathBuf::from("out/2024-06-01/report.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.to_string().contains("report.pdf"));
        assert_eq!(e.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn browser_failed_display() {
        let e = Md2PdfError::BrowserFailed {
            status: "exit status: 1".into(),
            stderr: "cannot open display".into(),
        };
        assert!(e.to_string().contains("exit status: 1"));
        assert!(e.to_string().contains("cannot open display"));
    }

    #[test]
    fn locate_error_converts() {
        let e: Md2PdfError = chrome_locate::LocateError::NotFound {
            searched: vec!["$PATH/chromium".into()],
        }
        .into();
        assert!(matches!(e, Md2PdfError::BrowserNotFound(_)));
        assert!(e.to_string().contains("$PATH/chromium"));
    }
}
