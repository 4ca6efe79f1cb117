//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI arguments to
//! `ConversionConfig`, runs one conversion and maps the outcome to an exit
//! status: 0 success, 1 conversion failure, 2 usage error (clap), 3 input
//! not found or unreadable.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    convert, ConversionConfig, ConversionOutput, ConversionProgressCallback, EscapeScope,
    Md2PdfError, OutputFormat, ProgressCallback, Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Single-line spinner showing the current stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, input: &Path) {
        self.bar.set_message(input.display().to_string());
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.label());
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{elapsed_ms}ms")),
        ));
    }

    fn on_conversion_complete(&self, _output: &Path) {
        self.bar.finish_and_clear();
    }

    fn on_conversion_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion; writes out/<today>/notes.pdf
  md2pdf notes.md out/notes.pdf

  # With a stylesheet
  md2pdf notes.md out/notes.pdf theme.css

  # Fixed output path, no date directory
  md2pdf --no-date-dir notes.md notes.pdf

  # Inspect the HTML that would be printed
  md2pdf --format html notes.md out/notes.html

  # Inside a container (Chrome's sandbox needs user namespaces)
  md2pdf --no-sandbox notes.md out/notes.pdf

EXIT STATUS:
  0  success
  1  conversion failed
  2  usage error
  3  input file not found or not readable

ENVIRONMENT VARIABLES:
  MD2PDF_CHROME       Browser executable (same as --chrome)
  CHROME              Fallback browser executable
  MD2PDF_STYLESHEET   Stylesheet used when none is given on the command line
  MD2PDF_TIMEOUT      Browser timeout in seconds
  RUST_LOG            Log filter, overrides --verbose/--quiet
"#;

/// Convert a Markdown document to an A4 PDF with a headless Chrome/Chromium.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown documents to A4 PDF through a headless Chrome/Chromium",
    long_about = "Convert a Markdown document (tables, fenced code, raw HTML) to an A4 PDF. \
The output file is placed in a YYYY-MM-DD directory next to the requested path.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert.
    input: PathBuf,

    /// Requested output path; the date directory is inserted before the file name.
    output: PathBuf,

    /// Optional CSS stylesheet. A missing file is reported and ignored.
    #[arg(env = "MD2PDF_STYLESHEET")]
    stylesheet: Option<PathBuf>,

    /// Chrome/Chromium executable (auto-discovered when omitted).
    #[arg(long, env = "MD2PDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Kill the browser if printing takes longer than this many seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Where `\<` and `\>` are rewritten to entities.
    #[arg(long, value_enum, default_value = "prose")]
    escape_scope: EscapeScopeArg,

    /// Write to the requested path itself instead of a date directory.
    #[arg(long)]
    no_date_dir: bool,

    /// Date naming the output directory (YYYY-MM-DD; default: today).
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Document title (default: input file name without extension).
    #[arg(long)]
    title: Option<String>,

    /// Document language tag.
    #[arg(long, default_value = "en")]
    lang: String,

    /// Output format.
    #[arg(long, value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Run the browser without its sandbox (needed in some containers).
    #[arg(long)]
    no_sandbox: bool,

    /// Print the conversion report as JSON instead of the output path.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EscapeScopeArg {
    Prose,
    Everywhere,
}

impl From<EscapeScopeArg> for EscapeScope {
    fn from(v: EscapeScopeArg) -> Self {
        match v {
            EscapeScopeArg::Prose => EscapeScope::Prose,
            EscapeScopeArg::Everywhere => EscapeScope::Everywhere,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Html,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Html => OutputFormat::Html,
        }
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; library INFO logs
    // would only tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .chain()
                .find_map(|e| e.downcast_ref::<Md2PdfError>())
                .map(Md2PdfError::exit_code)
                .unwrap_or(1);
            eprintln!("{} {:#}", red("error:"), err);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb)?;

    let output = convert(&cli.input, &cli.output, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        println!("{}", output.output_path.display());
        if !cli.quiet {
            print_summary(&output);
        }
    }

    Ok(())
}

fn print_summary(output: &ConversionOutput) {
    let stats = &output.stats;
    eprintln!(
        "{}  {}  →  {}  {}",
        green("✔"),
        output.input.display(),
        bold(&output.output_path.display().to_string()),
        dim(&format!(
            "{} bytes, {}ms",
            stats.output_bytes, stats.total_duration_ms
        )),
    );
    if output.format == OutputFormat::Pdf && !stats.stylesheet_applied {
        eprintln!("   {}", dim("no stylesheet applied"));
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .escape_scope(cli.escape_scope.into())
        .date_subdirectory(!cli.no_date_dir)
        .lang(cli.lang.clone())
        .format(cli.format.into())
        .sandbox(!cli.no_sandbox);

    if let Some(ref path) = cli.stylesheet {
        builder = builder.stylesheet(path);
    }
    if let Some(ref path) = cli.chrome {
        builder = builder.chrome_path(path);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.render_timeout_secs(secs);
    }
    if let Some(date) = cli.date {
        builder = builder.date(date);
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
