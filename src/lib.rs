//! # md2pdf
//!
//! Convert Markdown documents to A4 PDF files by printing them with a
//! headless Chrome/Chromium.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown (+ optional CSS)
//!  │
//!  ├─ 1. Read       UTF-8 source; a missing stylesheet only logs a warning
//!  ├─ 2. Normalize  \<Foo\> → &lt;Foo&gt; so tag-like prose stays visible
//!  ├─ 3. Compose    comrak (tables, fenced code, raw HTML) + syntect classes,
//!  │                wrapped in a fixed HTML skeleton with the CSS inline
//!  └─ 4. Render     headless browser prints A4 into <dir>/<YYYY-MM-DD>/<name>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .stylesheet("theme.css")
//!         .build()?;
//!     let output = convert("notes.md", "out/notes.pdf", &config).await?;
//!     println!("{}", output.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! Without an async runtime, use [`convert_sync`].
//!
//! ## Trusted input
//!
//! Raw HTML in the Markdown and the stylesheet text are inserted into the
//! printed document as is. Convert only documents you would open in your
//! own browser.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, EscapeScope, OutputFormat};
pub use convert::{convert, convert_sync, render_html};
pub use error::Md2PdfError;
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::compose::{compose_document, markdown_renderer, DocumentMeta, MarkdownRenderer};
pub use pipeline::escape::normalize_escapes;
pub use pipeline::output_path::{date_stamped_path, prepare_output_path};
pub use pipeline::render::BrowserSession;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
