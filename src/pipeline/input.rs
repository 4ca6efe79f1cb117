//! Input reading: the Markdown source and the optional stylesheet.
//!
//! The two files fail differently on purpose. An unreadable Markdown source
//! ends the conversion with [`Md2PdfError::FileNotFound`] (or a sibling
//! variant) naming the path. An unreadable stylesheet only costs the styling:
//! it is logged and the document is composed with an empty style block.

use crate::error::Md2PdfError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Read a Markdown file as UTF-8 text.
///
/// A leading byte-order mark is dropped so it never reaches the document body.
pub async fn read_markdown(path: &Path) -> Result<String, Md2PdfError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        // Directories and dangling links are "not found" from the user's view.
        _ => Md2PdfError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let text = String::from_utf8(bytes).map_err(|_| Md2PdfError::InvalidUtf8 {
        path: path.to_path_buf(),
    })?;

    debug!("Read {} bytes from {}", text.len(), path.display());
    Ok(strip_bom(text))
}

/// Read the stylesheet if one was configured and can be read.
///
/// Never fails: a missing, unreadable or non-UTF-8 file yields `None`.
pub async fn read_stylesheet(path: Option<&Path>) -> Option<String> {
    let path = path?;

    match tokio::fs::read(path).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(css) => {
                debug!("Loaded stylesheet {} ({} bytes)", path.display(), css.len());
                Some(strip_bom(css))
            }
            Err(_) => {
                warn!(
                    "Stylesheet '{}' is not valid UTF-8; using no stylesheet",
                    path.display()
                );
                None
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "Stylesheet '{}' not found; using no stylesheet",
                path.display()
            );
            None
        }
        Err(e) => {
            warn!(
                "Stylesheet '{}' could not be read ({}); using no stylesheet",
                path.display(),
                e
            );
            None
        }
    }
}

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}
