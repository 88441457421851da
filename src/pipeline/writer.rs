//! The dual-store writer: single serialized consumer of the result queue.
//!
//! Every extraction result goes through the same three-step protocol:
//!
//! 1. insert the relational `DocumentRecord` (status=pending),
//! 2. insert the `DocumentDetail` into the document store, compensating the
//!    record to status=error if this fails (pending must never survive a
//!    failed attempt — pending is indistinguishable from in-flight),
//! 3. backfill the cross-store reference and flip status=processed, with
//!    exactly one bounded retry; a second failure demotes the record to
//!    status=error while preserving the orphaned document-store key in
//!    `error_detail` for a later reconciliation pass.
//!
//! Re-ingesting an already-known document (same filename and content hash)
//! is detected before step 1 and is a no-op. Every store call carries a
//! bounded timeout treated the same as
//! a hard failure. The writer is one task, so writes for any document are
//! strictly sequential and never interleave.

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::data_model::{
    DocumentDetail, ExtractionOutcome, ExtractionResult, NewDocumentRecord,
};
use crate::metrics::MetricsAggregator;
use crate::stores::{DetailStore, MetadataStore, StoreError};
use crate::supervisor::{CircuitBreaker, SeenCache};

/// Terminal disposition of one write unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    Processed,
    Duplicate,
    Failed,
}

pub struct DualStoreWriter {
    metadata: Arc<dyn MetadataStore>,
    details: Arc<dyn DetailStore>,
    metrics: Arc<MetricsAggregator>,
    breaker: Arc<CircuitBreaker>,
    seen: Arc<SeenCache>,
    company_id: i64,
    store_timeout: Duration,
}

impl DualStoreWriter {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        details: Arc<dyn DetailStore>,
        metrics: Arc<MetricsAggregator>,
        breaker: Arc<CircuitBreaker>,
        seen: Arc<SeenCache>,
        company_id: i64,
        store_timeout: Duration,
    ) -> Self {
        DualStoreWriter {
            metadata,
            details,
            metrics,
            breaker,
            seen,
            company_id,
            store_timeout,
        }
    }

    /// Drains the result queue until it closes. Extraction failures are
    /// absorbed here too: counted, ring-buffered, fed to the breaker — never
    /// dropped, never escalated.
    pub async fn run(self, mut results: mpsc::Receiver<ExtractionOutcome>) {
        while let Some(outcome) = results.recv().await {
            match outcome {
                ExtractionOutcome::Extracted(result) => {
                    let started = Instant::now();
                    let disposition = self.write_one(result).await;
                    self.metrics.record_write_time(started.elapsed());
                    self.breaker
                        .record(disposition != WriteDisposition::Failed);
                }
                ExtractionOutcome::Failed {
                    item,
                    kind,
                    message,
                    worker_id,
                } => {
                    warn!(
                        path = %item.path.display(),
                        worker_id,
                        kind = kind.as_str(),
                        %message,
                        "extraction failed"
                    );
                    self.metrics.inc_extraction_failed();
                    self.metrics.record_error(&item.path, kind.as_str(), message);
                    self.breaker.record(false);
                }
            }
        }
        debug!("result queue closed; writer exiting");
    }

    /// Applies the three-step protocol to one extraction result. Always
    /// resolves to a terminal disposition.
    pub async fn write_one(&self, result: ExtractionResult) -> WriteDisposition {
        let path = result.item.path.clone();
        let filename = result
            .item
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Idempotency key per the write protocol: filename plus content hash.
        let identity = format!("{}:{}", filename, result.content_hash);

        // Step 0: idempotency — cache first, then the relational store.
        if self.seen.contains(&identity) {
            debug!(path = %path.display(), "document already ingested (cached); skipping");
            self.metrics.inc_duplicates();
            return WriteDisposition::Duplicate;
        }
        match self
            .bounded(self.metadata.find_by_identity(&filename, &result.content_hash))
            .await
        {
            Ok(Some(existing)) => {
                debug!(
                    path = %path.display(),
                    record_id = existing.id,
                    "document already ingested; skipping"
                );
                self.seen.insert(identity);
                self.metrics.inc_duplicates();
                return WriteDisposition::Duplicate;
            }
            Ok(None) => {}
            Err(e) => {
                self.metrics.inc_write_failed();
                self.metrics.record_error(
                    &path,
                    "store_unavailable",
                    format!("idempotency lookup failed: {}", e),
                );
                return WriteDisposition::Failed;
            }
        }

        // Step 1: the document becomes "known". Failure here fails the unit.
        let new_record = NewDocumentRecord {
            company_id: self.company_id,
            filename,
            size: result.item.size,
            mime_type: result.mime_type.clone(),
            content_hash: result.content_hash.clone(),
            created_at: Utc::now(),
        };
        let record_id = match self.bounded(self.metadata.insert_pending(&new_record)).await {
            Ok(id) => id,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "metadata insert failed");
                self.metrics.inc_write_failed();
                self.metrics.record_error(
                    &path,
                    "partial_write_step1",
                    format!("metadata insert failed: {}", e),
                );
                return WriteDisposition::Failed;
            }
        };

        // Step 2: full content into the document store, embedding the id.
        let detail = build_detail(record_id, &result);
        let detail_key = match self.bounded(self.details.insert(&detail)).await {
            Ok(key) => key,
            Err(e) => {
                let note = format!("detail insert failed: {}", e);
                warn!(path = %path.display(), record_id, error = %e, "detail insert failed; compensating");
                if let Err(ce) = self.compensate(record_id, &note).await {
                    error!(
                        record_id,
                        error = %ce,
                        "compensation failed; record left pending for reconciliation"
                    );
                    self.metrics.record_error(
                        &path,
                        "compensation_failed",
                        format!("record {}: {}", record_id, ce),
                    );
                }
                self.metrics.inc_write_failed();
                self.metrics.record_error(&path, "partial_write_step2", note);
                return WriteDisposition::Failed;
            }
        };

        // Step 3: backfill the cross-store reference, one bounded retry.
        match self.backfill(record_id, &detail_key).await {
            Ok(()) => {
                debug!(
                    path = %path.display(),
                    record_id,
                    detail_key = %detail_key,
                    "document processed"
                );
                self.seen.insert(identity);
                self.metrics.inc_processed();
                WriteDisposition::Processed
            }
            Err(e) => {
                // Steps 1-2 are not repeated. The detail record is orphaned
                // but detectable: the key rides in error_detail.
                let note = format!(
                    "cross-store backfill failed after retry: {}; orphaned detail key {}",
                    e, detail_key
                );
                info!(record_id, detail_key = %detail_key, "recording orphan candidate");
                if let Err(de) = self.bounded(self.metadata.mark_error(record_id, &note)).await {
                    error!(record_id, error = %de, "failed to demote record after backfill failure");
                }
                self.metrics.inc_write_failed();
                self.metrics.inc_orphan_candidates();
                self.metrics.record_error(&path, "orphan_candidate", note);
                WriteDisposition::Failed
            }
        }
    }

    async fn backfill(&self, record_id: i64, detail_key: &str) -> Result<(), StoreError> {
        match self.bounded(self.metadata.mark_processed(record_id, detail_key)).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(record_id, error = %first, "backfill failed; retrying once");
                self.bounded(self.metadata.mark_processed(record_id, detail_key))
                    .await
            }
        }
    }

    async fn compensate(&self, record_id: i64, note: &str) -> Result<(), StoreError> {
        match self.bounded(self.metadata.mark_error(record_id, note)).await {
            Ok(()) => Ok(()),
            // One immediate retry: a pending record that survives a failed
            // attempt is ambiguous in a way an error record is not.
            Err(_first) => self.bounded(self.metadata.mark_error(record_id, note)).await,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }
}

fn build_detail(record_id: i64, result: &ExtractionResult) -> DocumentDetail {
    let mut raw_metadata = HashMap::new();
    raw_metadata.insert(
        "filename".to_string(),
        result
            .item
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string(),
    );
    raw_metadata.insert("mime_type".to_string(), result.mime_type.clone());
    raw_metadata.insert("size".to_string(), result.item.size.to_string());
    raw_metadata.insert("content_hash".to_string(), result.content_hash.clone());
    raw_metadata.insert("worker_id".to_string(), result.worker_id.to_string());
    raw_metadata.insert(
        "extract_ms".to_string(),
        result.duration.as_millis().to_string(),
    );

    DocumentDetail {
        cross_store_ref: record_id,
        text: result.extraction.text.clone(),
        document_type: result.extraction.document_type.clone(),
        entities: result.extraction.entities.clone(),
        confidence: result.extraction.confidence.clone(),
        raw_metadata,
        created_at: Utc::now(),
    }
}
