//! Result types returned by a successful conversion.

use crate::config::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a caller needs to know about a finished conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Markdown source that was converted.
    pub input: PathBuf,

    /// Output path as the caller asked for it.
    pub requested_output: PathBuf,

    /// Path actually written. Differs from `requested_output` by the
    /// date-stamped directory unless that feature is disabled.
    pub output_path: PathBuf,

    /// What was written at `output_path`.
    pub format: OutputFormat,

    /// Sizes and timings.
    pub stats: ConversionStats,
}

/// Byte counts and per-stage wall-clock durations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Markdown source size.
    pub input_bytes: u64,
    /// Whether a stylesheet was found and injected.
    pub stylesheet_applied: bool,
    /// Composed HTML document size.
    pub html_bytes: u64,
    /// Size of the file written at the output path.
    pub output_bytes: u64,
    pub read_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_serialises_to_json() {
        let out = ConversionOutput {
            input: PathBuf::from("notes.md"),
            requested_output: PathBuf::from("out/notes.pdf"),
            output_path: PathBuf::from("out/2024-06-01/notes.pdf"),
            format: OutputFormat::Pdf,
            stats: ConversionStats {
                input_bytes: 120,
                output_bytes: 4096,
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["output_path"], "out/2024-06-01/notes.pdf");
        assert_eq!(json["format"], "pdf");
        assert_eq!(json["stats"]["output_bytes"], 4096);
    }
}
