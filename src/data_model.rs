use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::ExtractionError;

/// A single file reference produced by discovery. Created once, consumed
/// exactly once by a worker, never mutated.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub path: PathBuf,
    pub size: u64,
    pub discovered_at: DateTime<Utc>,
}

/// A named entity pulled out of the document text, with the extractor's
/// confidence in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub value: String,
    pub confidence: f64,
}

/// What the extractor produces for one document: full text, a classified
/// type, entities, and a per-field confidence map (all values in [0, 1]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub text: String,
    pub document_type: String,
    pub entities: Vec<Entity>,
    pub confidence: HashMap<String, f64>,
}

/// A successful extraction, owned by its worker until handed to the writer.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub item: WorkItem,
    /// sha256 of the raw bytes, hex encoded. Idempotency key for re-ingests.
    pub content_hash: String,
    pub mime_type: String,
    pub extraction: Extraction,
    pub worker_id: usize,
    pub duration: Duration,
}

/// Classification attached to a failed work item. Extraction failures are
/// per-document and never pipeline-fatal; the classification is what the
/// error ring buffer and the terminal report see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedFormat,
    Corrupt,
    Timeout,
    Unreadable,
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnsupportedFormat => "unsupported_format",
            FailureKind::Corrupt => "corrupt",
            FailureKind::Timeout => "timeout",
            FailureKind::Unreadable => "unreadable",
            FailureKind::Panicked => "panicked",
        }
    }
}

impl From<&ExtractionError> for FailureKind {
    fn from(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            ExtractionError::Corrupt(_) => FailureKind::Corrupt,
            ExtractionError::Timeout(_) => FailureKind::Timeout,
        }
    }
}

/// What a worker hands to the result queue: either a completed extraction or
/// a terminal failure carrying the original work item. Failures ride the same
/// channel so they are counted by the single consumer, never dropped.
#[derive(Debug)]
pub enum ExtractionOutcome {
    Extracted(ExtractionResult),
    Failed {
        item: WorkItem,
        kind: FailureKind,
        message: String,
        worker_id: usize,
    },
}

/// Processing status of a relational document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processed,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "processed" => Some(ProcessingStatus::Processed),
            "error" => Some(ProcessingStatus::Error),
            _ => None,
        }
    }
}

/// Canonical document identity, one row per ingested file in the relational
/// store. `cross_store_ref` is the document-store key, null until the
/// backfill step of the write protocol completes.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub company_id: i64,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub content_hash: String,
    pub status: ProcessingStatus,
    pub cross_store_ref: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for step 1 of the write protocol. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub company_id: i64,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Full-content record for the document store. Always created after its
/// DocumentRecord exists, and always embeds that record's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub cross_store_ref: i64,
    pub text: String,
    pub document_type: String,
    pub entities: Vec<Entity>,
    pub confidence: HashMap<String, f64>,
    pub raw_metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Terminal run summary, persisted to the relational store and logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    pub skipped_duplicates: u64,
    pub orphan_candidates: u64,
    pub duration_secs: f64,
    pub throughput_per_sec: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub clean_drain: bool,
}
