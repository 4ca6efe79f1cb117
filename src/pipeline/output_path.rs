//! Output path construction: `<dir>/<YYYY-MM-DD>/<file name>`.
//!
//! Only the directory and file-name components of the requested path are
//! kept; the date directory is inserted between them. Creating that directory
//! is idempotent, so a second conversion on the same day, or another process
//! racing to create it, is never an error.

use crate::error::Md2PdfError;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `strftime` pattern naming the date directory.
pub const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Name of the date directory for `date`, e.g. `2024-06-01`.
pub fn date_dir_name(date: NaiveDate) -> String {
    date.format(DATE_DIR_FORMAT).to_string()
}

/// Compute the final output path without touching the filesystem.
///
/// ```rust
/// use chrono::NaiveDate;
/// use md2pdf::date_stamped_path;
/// use std::path::Path;
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let path = date_stamped_path(Path::new("out/report.pdf"), date).unwrap();
/// assert_eq!(path, Path::new("out/2024-06-01/report.pdf"));
/// ```
pub fn date_stamped_path(requested: &Path, date: NaiveDate) -> Result<PathBuf, Md2PdfError> {
    let file_name = requested
        .file_name()
        .ok_or_else(|| Md2PdfError::InvalidOutputPath {
            path: requested.to_path_buf(),
        })?;
    let parent = requested.parent().unwrap_or_else(|| Path::new(""));

    Ok(parent.join(date_dir_name(date)).join(file_name))
}

/// Compute the final output path and make sure its directory exists.
///
/// With `date` set to `None` the requested path is used as is (only its
/// parent directory is created).
pub async fn prepare_output_path(
    requested: &Path,
    date: Option<NaiveDate>,
) -> Result<PathBuf, Md2PdfError> {
    let path = match date {
        Some(date) => date_stamped_path(requested, date)?,
        None => {
            if requested.file_name().is_none() {
                return Err(Md2PdfError::InvalidOutputPath {
                    path: requested.to_path_buf(),
                });
            }
            requested.to_path_buf()
        }
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Md2PdfError::OutputDirFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
        debug!("Output directory ready: {}", dir.display());
    }

    Ok(path)
}
