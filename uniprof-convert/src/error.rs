use thiserror::Error;

/// A `ConversionError` per spec.md §7: the raw artifact was missing or
/// couldn't be parsed into a canonical profile. The orchestrator surfaces
/// these as generic post-processing failures (exit 1).
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error while reading raw profiler output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse raw profiler output as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse Instruments XML export: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed input at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("raw artifact was empty; nothing to convert")]
    Empty,
}
