use thiserror::Error;

/// Errors the analyzer can raise (spec.md §4.6). An invalid `filterRegex` is
/// the one user-input error this crate surfaces; everything else is a data
/// problem with the profile itself.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid filter regex: {0}")]
    InvalidFilterRegex(#[from] regex::Error),

    #[error("profile has no profiles to analyze")]
    EmptyProfile,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read profile JSON: {0}")]
    Schema(#[from] uniprof_schema::SchemaError),

    #[error("failed to serialize analysis output: {0}")]
    Json(#[from] serde_json::Error),
}
