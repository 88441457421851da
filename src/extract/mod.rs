use async_trait::async_trait;
use thiserror::Error;

use crate::data_model::Extraction;

pub mod classifier;
pub mod plain;

pub use classifier::RuleCatalog;
pub use plain::PlainTextExtractor;

/// Failure modes of the extraction contract. All of these are per-document:
/// the pipeline records them and moves on.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("extraction timed out: {0}")]
    Timeout(String),
}

/// The extraction stage contract. Implementations take raw bytes plus the
/// filename and produce text, a classified type, entities, and per-field
/// confidences. OCR/NLP backends plug in here; the pipeline core only knows
/// this trait.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<Extraction, ExtractionError>;
}
