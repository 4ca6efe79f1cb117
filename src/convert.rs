//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline once, linearly:
//!
//! 1. read the Markdown source (failure here writes nothing)
//! 2. normalise escaped angle brackets
//! 3. compose the HTML document (Markdown → fragment → skeleton + CSS)
//! 4. locate the browser, create the date directory, print the PDF
//!
//! The browser is located before the output directory is created, so a
//! machine without Chrome does not accumulate empty date directories.

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::Md2PdfError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::compose::{compose_document, markdown_renderer, DocumentMeta};
use crate::pipeline::escape::normalize_escapes;
use crate::pipeline::render::{self, BrowserSession};
use crate::pipeline::{input, output_path};
use crate::progress::Stage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Title used when neither the config nor the input path provides one.
const FALLBACK_TITLE: &str = "Document";

/// Convert a Markdown file to an A4 PDF (or, with [`OutputFormat::Html`],
/// to the composed HTML document).
///
/// `output` is the requested path; unless
/// [`ConversionConfig::date_subdirectory`] is off, the file lands in a
/// `YYYY-MM-DD` directory next to it. The path actually written is reported
/// in [`ConversionOutput::output_path`].
///
/// # Errors
/// - [`Md2PdfError::FileNotFound`] / [`Md2PdfError::PermissionDenied`] when
///   the input cannot be opened; nothing is written in that case.
/// - Any other variant for a failure after the input was read.
///
/// A missing stylesheet is not an error.
pub async fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let input = input.as_ref();
    let output = output.as_ref();
    info!("Converting {} → {}", input.display(), output.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(input);
    }

    let result = run_pipeline(input, output, config).await;

    match &result {
        Ok(out) => {
            info!(
                "Converted {} in {}ms → {}",
                input.display(),
                out.stats.total_duration_ms,
                out.output_path.display()
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_complete(&out.output_path);
            }
        }
        Err(e) => {
            warn!("Conversion of {} failed: {}", input.display(), e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_error(&e.to_string());
            }
        }
    }

    result
}

/// Blocking wrapper around [`convert`] on a private current-thread runtime.
///
/// Must not be called from inside an async context.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, output, config))
}

/// Read, normalise and compose without a browser: returns the HTML document
/// that [`convert`] would print.
pub async fn render_html(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<String, Md2PdfError> {
    let mut stats = ConversionStats::default();
    compose_from_file(input.as_ref(), config, &mut stats).await
}

async fn run_pipeline(
    input: &Path,
    output: &Path,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let total_start = Instant::now();
    let mut stats = ConversionStats::default();

    // ── Steps 1-3: read, normalise, compose ──────────────────────────────
    let html = compose_from_file(input, config, &mut stats).await?;

    // ── Step 4: render ───────────────────────────────────────────────────
    stage_start(config, Stage::Render);
    let render_start = Instant::now();

    let session = match config.format {
        OutputFormat::Pdf => Some(BrowserSession::from_config(config)?),
        OutputFormat::Html => None,
    };

    let date = config
        .date_subdirectory
        .then(|| config.effective_date());
    let output_path = output_path::prepare_output_path(output, date).await?;

    stats.output_bytes = match session {
        Some(session) => session.print_to_pdf(&html, &output_path).await?,
        None => render::write_html(&html, &output_path).await?,
    };

    stats.render_duration_ms = render_start.elapsed().as_millis() as u64;
    stage_complete(config, Stage::Render, stats.render_duration_ms);

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    Ok(ConversionOutput {
        input: input.to_path_buf(),
        requested_output: output.to_path_buf(),
        output_path,
        format: config.format,
        stats,
    })
}

async fn compose_from_file(
    input: &Path,
    config: &ConversionConfig,
    stats: &mut ConversionStats,
) -> Result<String, Md2PdfError> {
    // ── Read ─────────────────────────────────────────────────────────────
    stage_start(config, Stage::Read);
    let read_start = Instant::now();
    let markdown = input::read_markdown(input).await?;
    let css = input::read_stylesheet(config.stylesheet.as_deref()).await;
    stats.input_bytes = markdown.len() as u64;
    stats.stylesheet_applied = css.is_some();
    stats.read_duration_ms = read_start.elapsed().as_millis() as u64;
    stage_complete(config, Stage::Read, stats.read_duration_ms);

    // ── Normalise ────────────────────────────────────────────────────────
    stage_start(config, Stage::Normalize);
    let normalize_start = Instant::now();
    let normalized = normalize_escapes(&markdown, config.escape_scope);
    stage_complete(
        config,
        Stage::Normalize,
        normalize_start.elapsed().as_millis() as u64,
    );

    // ── Compose ──────────────────────────────────────────────────────────
    stage_start(config, Stage::Compose);
    let compose_start = Instant::now();

    // Highlighting is CPU-bound; keep it off the async executor.
    let fragment = tokio::task::spawn_blocking(move || markdown_renderer().to_html(&normalized))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Compose task panicked: {}", e)))??;

    let title = document_title(input, config);
    let meta = DocumentMeta {
        title: &title,
        lang: &config.lang,
    };
    let html = compose_document(&fragment, css.as_deref(), &meta);

    stats.html_bytes = html.len() as u64;
    stats.compose_duration_ms = compose_start.elapsed().as_millis() as u64;
    debug!(
        "Composed {} bytes of HTML (stylesheet: {})",
        html.len(),
        stats.stylesheet_applied
    );
    stage_complete(config, Stage::Compose, stats.compose_duration_ms);

    Ok(html)
}

fn document_title(input: &Path, config: &ConversionConfig) -> String {
    if let Some(ref title) = config.title {
        return title.clone();
    }
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

fn stage_start(config: &ConversionConfig, stage: Stage) {
    debug!("{} started", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_complete(config: &ConversionConfig, stage: Stage, elapsed_ms: u64) {
    info!("{} finished in {}ms", stage, elapsed_ms);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, elapsed_ms);
    }
}
