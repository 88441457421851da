//! Store contracts consumed by the dual-store writer.
//!
//! The relational side holds canonical document identities and supports
//! row-level transactions; the document side holds full content and analysis
//! and hands back a store-generated key. There is deliberately no transaction
//! spanning both — the writer's three-step protocol owns cross-store
//! consistency.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::data_model::{
    DocumentDetail, DocumentRecord, FinalReport, NewDocumentRecord, ProcessingStatus,
};

pub mod jsondir;
pub mod sqlite;

pub use jsondir::JsonDetailStore;
pub use sqlite::SqliteMetadataStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

/// The relational store contract. Inserts return the store-assigned id;
/// updates are row-level transactions, never cross-store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Idempotency lookup keyed on filename plus content hash: a known pair
    /// means the document was already ingested.
    async fn find_by_identity(
        &self,
        filename: &str,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, StoreError>;

    /// Step 1 of the write protocol: insert with status=pending and a null
    /// cross-store reference.
    async fn insert_pending(&self, record: &NewDocumentRecord) -> Result<i64, StoreError>;

    /// Step 3 of the write protocol: backfill the cross-store reference and
    /// flip the status to processed.
    async fn mark_processed(&self, id: i64, detail_key: &str) -> Result<(), StoreError>;

    /// Compensation/demotion: set status=error with a self-describing detail
    /// (which preserves an orphaned document-store key when there is one).
    async fn mark_error(&self, id: i64, detail: &str) -> Result<(), StoreError>;

    async fn get(&self, id: i64) -> Result<Option<DocumentRecord>, StoreError>;

    /// Status census, used by reconciliation and by invariant checks: after
    /// a drain no record may be left pending.
    async fn count_by_status(&self, status: ProcessingStatus) -> Result<u64, StoreError>;

    /// Persists the terminal run report.
    async fn save_report(&self, report: &FinalReport) -> Result<i64, StoreError>;
}

/// The document store contract: schemaless inserts returning a
/// store-generated key.
#[async_trait]
pub trait DetailStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert(&self, detail: &DocumentDetail) -> Result<String, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<DocumentDetail>, StoreError>;
}
