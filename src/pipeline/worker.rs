//! The fixed-size extraction worker pool.
//!
//! Workers are stateless and independent: dequeue, read, hash, extract, push
//! the outcome. Extraction is at-most-once per work item within a run — any
//! retry policy lives above the pool, not in this loop. A panic inside
//! extraction is caught at the loop boundary and converted to a failed
//! outcome; a single bad document must never kill a worker.

use futures::FutureExt;
use sha2::{Digest, Sha256};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::data_model::{ExtractionOutcome, ExtractionResult, FailureKind, WorkItem};
use crate::extract::Extractor;
use crate::metrics::MetricsAggregator;
use crate::pipeline::queue::WorkSource;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers draining the shared work source. The pool size
    /// is fixed for the lifetime of the run.
    pub fn spawn(
        count: usize,
        source: WorkSource,
        extractor: Arc<dyn Extractor>,
        results: mpsc::Sender<ExtractionOutcome>,
        metrics: Arc<MetricsAggregator>,
        extract_timeout: Duration,
    ) -> Self {
        let handles = (0..count)
            .map(|worker_id| {
                let source = source.clone();
                let extractor = Arc::clone(&extractor);
                let results = results.clone();
                let metrics = Arc::clone(&metrics);
                tokio::spawn(worker_loop(
                    worker_id,
                    source,
                    extractor,
                    results,
                    metrics,
                    extract_timeout,
                ))
            })
            .collect();
        WorkerPool { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to exit (the work queue must be closed first).
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    /// Forced stop: aborts all workers without waiting for in-flight work.
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    source: WorkSource,
    extractor: Arc<dyn Extractor>,
    results: mpsc::Sender<ExtractionOutcome>,
    metrics: Arc<MetricsAggregator>,
    extract_timeout: Duration,
) {
    while let Some(item) = source.dequeue().await {
        let outcome = run_extraction(worker_id, item, extractor.as_ref(), extract_timeout).await;
        if let ExtractionOutcome::Extracted(result) = &outcome {
            metrics.record_extract_time(result.duration);
        }
        if results.send(outcome).await.is_err() {
            // Writer is gone; nothing left to hand work to.
            break;
        }
    }
    debug!(worker_id, "work queue closed; worker exiting");
}

async fn run_extraction(
    worker_id: usize,
    item: WorkItem,
    extractor: &dyn Extractor,
    extract_timeout: Duration,
) -> ExtractionOutcome {
    let started = Instant::now();

    let bytes = match tokio::fs::read(&item.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ExtractionOutcome::Failed {
                kind: FailureKind::Unreadable,
                message: format!("failed to read {}: {}", item.path.display(), e),
                item,
                worker_id,
            };
        }
    };
    let content_hash = hex::encode(Sha256::digest(&bytes));
    let mime_type = mime_for(&item.path);
    let filename = item
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let extraction = AssertUnwindSafe(extractor.extract(&bytes, &filename)).catch_unwind();
    match tokio::time::timeout(extract_timeout, extraction).await {
        Err(_) => ExtractionOutcome::Failed {
            kind: FailureKind::Timeout,
            message: format!("extraction exceeded {:?}", extract_timeout),
            item,
            worker_id,
        },
        Ok(Err(panic)) => ExtractionOutcome::Failed {
            kind: FailureKind::Panicked,
            message: panic_message(panic),
            item,
            worker_id,
        },
        Ok(Ok(Err(e))) => ExtractionOutcome::Failed {
            kind: FailureKind::from(&e),
            message: e.to_string(),
            item,
            worker_id,
        },
        Ok(Ok(Ok(extraction))) => ExtractionOutcome::Extracted(ExtractionResult {
            item,
            content_hash,
            mime_type,
            extraction,
            worker_id,
            duration: started.elapsed(),
        }),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("extractor panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("extractor panicked: {}", message)
    } else {
        "extractor panicked".to_string()
    }
}

fn mime_for(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" => "text/html",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}
