//! PDF export: print the composed HTML to A4 with a headless Chrome/Chromium.
//!
//! Each call owns one [`BrowserSession`]: a located browser executable plus a
//! private temporary directory holding the browser profile and the page
//! document. The page is loaded from a `file://` URL in that directory, so no
//! content is fetched over the network. Dropping the session removes the
//! directory; the browser child is spawned with `kill_on_drop`, so a timeout
//! or cancelled future never leaves a process behind.
//!
//! ## Output atomicity
//!
//! The browser prints into a hidden staging file created next to the final
//! path (`.<random>.pdf.tmp`). The staging file is checked for a `%PDF-`
//! header before it is renamed over the destination; on any failure it is
//! deleted. Either one valid PDF appears at the destination or nothing does.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// Rule appended to every printed document. It follows the user stylesheet
/// so the page size cannot be overridden by it.
pub const PAGE_SIZE_RULE: &str = "<style>@page { size: A4; }</style>";

const PDF_MAGIC: &[u8] = b"%PDF-";
const PAGE_FILE: &str = "page.html";
const PROFILE_DIR: &str = "profile";
/// Lines of browser stderr kept in a [`Md2PdfError::BrowserFailed`].
const STDERR_TAIL_LINES: usize = 5;
/// Creation mode for output files, narrowed by the process umask like any
/// other newly created file.
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o666;

/// Append [`PAGE_SIZE_RULE`] at the end of `<head>`, or prepend it when the
/// document has no head.
pub fn with_page_size(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + PAGE_SIZE_RULE.len() + 1);
    match find_ascii_case_insensitive(html, "</head>") {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(PAGE_SIZE_RULE);
            out.push('\n');
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(PAGE_SIZE_RULE);
            out.push('\n');
            out.push_str(html);
        }
    }
    out
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

// ── Browser session ──────────────────────────────────────────────────────────

/// One headless-browser print job's worth of resources.
#[derive(Debug)]
pub struct BrowserSession {
    executable: PathBuf,
    workdir: TempDir,
    timeout: Option<Duration>,
    sandbox: bool,
}

impl BrowserSession {
    /// Locate the browser (explicit path first, then environment, `PATH`
    /// and install locations) and create the session directory.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Md2PdfError> {
        let executable = match config.chrome_path.as_deref() {
            Some(path) => chrome_locate::locate_from(Some(path))?,
            None => chrome_locate::locate_chrome()?,
        };
        Ok(Self::new(executable)?
            .with_timeout(config.render_timeout_secs.map(Duration::from_secs))
            .with_sandbox(config.sandbox))
    }

    /// Session around a known executable, sandboxed and without a timeout.
    pub fn new(executable: PathBuf) -> Result<Self, Md2PdfError> {
        let workdir = tempfile::Builder::new()
            .prefix("md2pdf-")
            .tempdir()
            .map_err(|e| Md2PdfError::Internal(format!("Cannot create browser session directory: {e}")))?;
        debug!(
            "Browser session: {} (workdir {})",
            executable.display(),
            workdir.path().display()
        );
        Ok(Self {
            executable,
            workdir,
            timeout: None,
            sandbox: true,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Directory removed when the session is dropped.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Print `html` as an A4 PDF to `dest`. Returns the PDF size in bytes.
    ///
    /// `dest`'s directory must already exist.
    pub async fn print_to_pdf(&self, html: &str, dest: &Path) -> Result<u64, Md2PdfError> {
        let page = self.write_page(html).await?;
        let page_url = Url::from_file_path(&page).map_err(|()| {
            Md2PdfError::Internal(format!("Cannot build file URL for {}", page.display()))
        })?;

        let staging = staging_file(dest, "pdf")?;
        self.run_browser(&page_url, staging.path()).await?;

        let size = validate_pdf(staging.path()).await?;
        persist(staging, dest)?;

        info!("PDF written: {} ({} bytes)", dest.display(), size);
        Ok(size)
    }

    async fn write_page(&self, html: &str) -> Result<PathBuf, Md2PdfError> {
        let page = self.workdir.path().join(PAGE_FILE);
        tokio::fs::write(&page, with_page_size(html))
            .await
            .map_err(|e| Md2PdfError::Internal(format!("Cannot write page document: {e}")))?;
        Ok(page)
    }

    fn browser_args(&self, page: &Url, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--headless",
            "--disable-gpu",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-extensions",
            "--disable-background-networking",
            "--hide-scrollbars",
            "--no-pdf-header-footer",
            "--print-to-pdf-no-header",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        if !self.sandbox {
            args.push("--no-sandbox".into());
        }

        let mut profile = OsString::from("--user-data-dir=");
        profile.push(self.workdir.path().join(PROFILE_DIR));
        args.push(profile);

        let mut print = OsString::from("--print-to-pdf=");
        print.push(target);
        args.push(print);

        args.push(page.as_str().into());
        args
    }

    async fn run_browser(&self, page: &Url, target: &Path) -> Result<(), Md2PdfError> {
        let args = self.browser_args(page, target);
        debug!("Launching {} {:?}", self.executable.display(), args);

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Md2PdfError::BrowserLaunchFailed {
                path: self.executable.clone(),
                source: e,
            })?;

        let mut stderr_pipe = child.stderr.take();
        let run = async {
            let mut stderr = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                // A read error only loses diagnostics.
                let _ = pipe.read_to_end(&mut stderr).await;
            }
            let status = child.wait().await;
            (status, stderr)
        };

        let (status, stderr) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(done) => done,
                Err(_) => {
                    warn!("Browser did not finish within {}s; killed", limit.as_secs());
                    return Err(Md2PdfError::RenderTimeout {
                        secs: limit.as_secs(),
                    });
                }
            },
            None => run.await,
        };

        let status = status.map_err(|e| Md2PdfError::BrowserLaunchFailed {
            path: self.executable.clone(),
            source: e,
        })?;

        if !status.success() {
            return Err(Md2PdfError::BrowserFailed {
                status: status.to_string(),
                stderr: stderr_tail(&stderr),
            });
        }
        Ok(())
    }
}

// ── Output files ─────────────────────────────────────────────────────────────

/// Write the composed HTML document to `dest` through a staging file.
/// Returns the number of bytes written.
pub async fn write_html(html: &str, dest: &Path) -> Result<u64, Md2PdfError> {
    let staging = staging_file(dest, "html")?;
    tokio::fs::write(staging.path(), html)
        .await
        .map_err(|e| Md2PdfError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
    persist(staging, dest)?;

    info!("HTML written: {} ({} bytes)", dest.display(), html.len());
    Ok(html.len() as u64)
}

fn staging_file(dest: &Path, extension: &str) -> Result<NamedTempFile, Md2PdfError> {
    let dir = dest
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = format!(".{extension}.tmp");
    let mut builder = tempfile::Builder::new();
    builder.prefix(".").suffix(&suffix);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(OUTPUT_FILE_MODE));
    }
    builder
        .tempfile_in(dir)
        .map_err(|e| Md2PdfError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })
}

fn persist(staging: NamedTempFile, dest: &Path) -> Result<(), Md2PdfError> {
    staging
        .persist(dest)
        .map(|_| ())
        .map_err(|e| Md2PdfError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source: e.error,
        })
}

/// Size of the file at `path` if it starts with the PDF magic.
async fn validate_pdf(path: &Path) -> Result<u64, Md2PdfError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Md2PdfError::InvalidPdf {
        detail: format!("browser output unreadable: {e}"),
    })?;
    if bytes.is_empty() {
        return Err(Md2PdfError::InvalidPdf {
            detail: "browser produced an empty file".into(),
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(Md2PdfError::InvalidPdf {
            detail: "missing %PDF- header".into(),
        });
    }
    Ok(bytes.len() as u64)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_rule_goes_after_user_styles() {
        let html = "<html><head><style>@page { size: letter; }</style></head><body></body></html>";
        let out = with_page_size(html);

        let user = out.find("size: letter").unwrap();
        let a4 = out.find("size: A4").unwrap();
        let head_end = out.find("</head>").unwrap();
        assert!(user < a4 && a4 < head_end, "got: {out}");
    }

    #[test]
    fn page_size_rule_head_match_is_case_insensitive() {
        let out = with_page_size("<HEAD></HEAD><p>x</p>");
        assert!(out.starts_with("<HEAD><style>@page"), "got: {out}");
    }

    #[test]
    fn page_size_rule_prepended_without_head() {
        let out = with_page_size("<p>fragment</p>");
        assert!(out.starts_with(PAGE_SIZE_RULE));
        assert!(out.ends_with("<p>fragment</p>"));
    }

    #[test]
    fn browser_args_disable_decorations_and_point_at_page() {
        let session = BrowserSession::new(PathBuf::from("/usr/bin/chromium")).unwrap();
        let page = Url::from_file_path(session.workdir().join(PAGE_FILE)).unwrap();
        let args = session.browser_args(&page, Path::new("/tmp/out.pdf"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-pdf-header-footer".to_string()));
        assert!(args.contains(&"--print-to-pdf=/tmp/out.pdf".to_string()));
        assert!(!args.contains(&"--no-sandbox".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-data-dir=")));
        assert!(args.last().unwrap().starts_with("file:///"));
    }

    #[test]
    fn browser_args_without_sandbox() {
        let session = BrowserSession::new(PathBuf::from("chromium"))
            .unwrap()
            .with_sandbox(false);
        let page = Url::parse("file:///tmp/page.html").unwrap();
        let args = session.browser_args(&page, Path::new("out.pdf"));
        assert!(args.iter().any(|a| a == "--no-sandbox"));
    }

    #[test]
    fn session_directory_removed_on_drop() {
        let session = BrowserSession::new(PathBuf::from("chromium")).unwrap();
        let dir = session.workdir().to_path_buf();
        assert!(dir.is_dir());
        drop(session);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn missing_executable_is_launch_failure_and_leaves_no_output() {
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("doc.pdf");
        let session = BrowserSession::new(out.path().join("no-such-browser")).unwrap();

        let err = session.print_to_pdf("<p>x</p>", &dest).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::BrowserLaunchFailed { .. }), "got {err:?}");
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn validate_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pdf");
        let html = dir.path().join("html.pdf");
        let pdf = dir.path().join("ok.pdf");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&html, b"<html>").unwrap();
        std::fs::write(&pdf, b"%PDF-1.7\n%%EOF\n").unwrap();

        assert!(matches!(validate_pdf(&empty).await, Err(Md2PdfError::InvalidPdf { .. })));
        assert!(matches!(validate_pdf(&html).await, Err(Md2PdfError::InvalidPdf { .. })));
        assert_eq!(validate_pdf(&pdf).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn write_html_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("doc.html");
        std::fs::write(&dest, "old").unwrap();

        let n = write_html("<p>new</p>", &dest).await.unwrap();

        assert_eq!(n, 10);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "<p>new</p>");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_files_get_regular_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("reference.txt");
        std::fs::write(&reference, "x").unwrap();
        let expected = std::fs::metadata(&reference).unwrap().permissions().mode() & 0o777;

        let dest = dir.path().join("doc.html");
        write_html("<p>x</p>", &dest).await.unwrap();
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected, "html mode {mode:o}, expected {expected:o}");

        let staging = staging_file(&dir.path().join("doc.pdf"), "pdf").unwrap();
        let mode = staging.as_file().metadata().unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected, "pdf staging mode {mode:o}, expected {expected:o}");
    }

    #[test]
    fn session_from_config_applies_timeout_and_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let browser = dir.path().join("chromium");
        std::fs::write(&browser, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&browser, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let config = ConversionConfig::builder()
            .chrome_path(&browser)
            .render_timeout_secs(7)
            .sandbox(false)
            .build()
            .unwrap();
        let session = BrowserSession::from_config(&config).unwrap();

        assert_eq!(session.timeout, Some(Duration::from_secs(7)));
        assert!(!session.sandbox);
        assert_eq!(session.executable, browser);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let raw = b"a\n\nb\nc\nd\ne\nf\n";
        assert_eq!(stderr_tail(raw), "b; c; d; e; f");
        assert_eq!(stderr_tail(b""), "");
    }
}
