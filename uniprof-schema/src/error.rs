use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to serialize or deserialize canonical profile JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error while reading or writing a canonical profile: {0}")]
    Io(#[from] std::io::Error),
}
