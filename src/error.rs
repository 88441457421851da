use thiserror::Error;

use crate::extract::ExtractionError;
use crate::stores::StoreError;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The Error type for ingestion pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Extraction error: {source}")]
    Extraction {
        #[from]
        source: ExtractionError,
    },

    #[error("Store error: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    /// A store stayed unreachable past the bounded reconnect policy.
    /// Fatal for the run; maps to exit code 1.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A dual-store write unit left in a non-terminal state. The writer
    /// resolves every unit to processed or error before reporting it, so this
    /// only surfaces when that resolution itself could not be recorded.
    #[error("Partial write for record {record_id}: {detail}")]
    PartialWrite { record_id: i64, detail: String },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
