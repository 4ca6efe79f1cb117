//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Input and output paths are passed to
//! [`crate::convert()`] directly; everything else (stylesheet, browser,
//! escape scope, date directory, document metadata) lives here.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf::{ConversionConfig, EscapeScope};
///
/// let config = ConversionConfig::builder()
///     .stylesheet("style.css")
///     .escape_scope(EscapeScope::Everywhere)
///     .render_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// CSS file injected verbatim into the document's `<style>` block.
    ///
    /// A path that does not exist or cannot be read is treated as "no
    /// stylesheet": the style block stays empty and a warning is logged.
    pub stylesheet: Option<PathBuf>,

    /// Browser executable. If None, discovered by `chrome-locate`.
    pub chrome_path: Option<PathBuf>,

    /// Upper bound on the browser run in seconds. Default: None (unbounded).
    pub render_timeout_secs: Option<u64>,

    /// Where `\<` / `\>` are rewritten to entities. Default: [`EscapeScope::Prose`].
    pub escape_scope: EscapeScope,

    /// Nest the output under a `YYYY-MM-DD` directory. Default: true.
    pub date_subdirectory: bool,

    /// Date used for the output directory. If None, today's local date.
    pub date: Option<NaiveDate>,

    /// Document `<title>`. If None, the input file stem.
    pub title: Option<String>,

    /// `lang` attribute of the `<html>` element. Default: "en".
    pub lang: String,

    /// What gets written at the output path. Default: [`OutputFormat::Pdf`].
    pub format: OutputFormat,

    /// Run the browser with its sandbox. Default: true.
    ///
    /// Disable only in containers running as root, where Chromium refuses
    /// to start sandboxed.
    pub sandbox: bool,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            stylesheet: None,
            chrome_path: None,
            render_timeout_secs: None,
            escape_scope: EscapeScope::default(),
            date_subdirectory: true,
            date: None,
            title: None,
            lang: "en".to_string(),
            format: OutputFormat::default(),
            sandbox: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("stylesheet", &self.stylesheet)
            .field("chrome_path", &self.chrome_path)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("escape_scope", &self.escape_scope)
            .field("date_subdirectory", &self.date_subdirectory)
            .field("date", &self.date)
            .field("title", &self.title)
            .field("lang", &self.lang)
            .field("format", &self.format)
            .field("sandbox", &self.sandbox)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The date that names the output directory.
    pub fn effective_date(&self) -> NaiveDate {
        self.date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn stylesheet(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stylesheet = Some(path.into());
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = Some(secs);
        self
    }

    pub fn escape_scope(mut self, scope: EscapeScope) -> Self {
        self.config.escape_scope = scope;
        self
    }

    pub fn date_subdirectory(mut self, v: bool) -> Self {
        self.config.date_subdirectory = v;
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.config.date = Some(date);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.config.lang = lang.into();
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn sandbox(mut self, v: bool) -> Self {
        self.config.sandbox = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.render_timeout_secs == Some(0) {
            return Err(Md2PdfError::InvalidConfig(
                "Render timeout must be ≥ 1 second".into(),
            ));
        }
        if c.lang.trim().is_empty()
            || !c
                .lang
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Invalid language tag '{}'",
                c.lang
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which parts of the Markdown source the escape normaliser rewrites.
///
/// Inside code, `\<` is usually meant literally: turning it into `&lt;`
/// would print the entity text instead of the bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EscapeScope {
    /// Everything except fenced code blocks and inline code spans. (default)
    #[default]
    Prose,
    /// The whole document, code included.
    Everywhere,
}

/// What the conversion writes at the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A4 PDF printed by the browser. (default)
    #[default]
    Pdf,
    /// The composed HTML document; no browser is started.
    Html,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pdf => f.write_str("pdf"),
            OutputFormat::Html => f.write_str("html"),
        }
    }
}
