//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements one step and is usable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ escape ──▶ compose ──▶ output_path ──▶ render
//! (.md/.css) (\< → &lt;) (comrak+syntect) (YYYY-MM-DD/) (headless Chrome)
//! ```
//!
//! 1. [`input`]   read the Markdown source (fatal) and the stylesheet (optional)
//! 2. [`escape`]  rewrite backslash-escaped angle brackets to entities
//! 3. [`compose`] Markdown → HTML fragment → full document with inline CSS
//! 4. [`output_path`] compute and create the date-stamped output directory
//! 5. [`render`]  print the document to A4 PDF through a [`render::BrowserSession`]

pub mod compose;
pub mod escape;
pub mod input;
pub mod output_path;
pub mod render;
