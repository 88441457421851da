//! Thread-safe ingest counters and the terminal report.
//!
//! Counters are plain atomics; the error ring is a bounded deque behind a
//! short-critical-section mutex. `snapshot()` copies everything out so
//! readers (heartbeat logging, the final report) never block producers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::data_model::FinalReport;

pub const DEFAULT_ERROR_RING_CAPACITY: usize = 64;

/// One entry in the bounded ring of recent errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub path: String,
    pub classification: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    discovered: AtomicU64,
    skipped: AtomicU64,
    processed: AtomicU64,
    extraction_failed: AtomicU64,
    write_failed: AtomicU64,
    duplicates: AtomicU64,
    orphan_candidates: AtomicU64,
    extract_nanos: AtomicU64,
    extract_samples: AtomicU64,
    write_nanos: AtomicU64,
    write_samples: AtomicU64,
    errors: Mutex<VecDeque<ErrorEntry>>,
    ring_capacity: usize,
}

impl MetricsAggregator {
    pub fn new(ring_capacity: usize) -> Self {
        MetricsAggregator {
            ring_capacity: ring_capacity.max(1),
            ..Default::default()
        }
    }

    pub fn inc_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_extraction_failed(&self) {
        self.extraction_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_write_failed(&self) {
        self.write_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orphan_candidates(&self) {
        self.orphan_candidates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extract_time(&self, duration: Duration) {
        self.extract_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.extract_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_time(&self, duration: Duration) {
        self.write_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.write_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, path: &Path, classification: &str, message: impl Into<String>) {
        let entry = ErrorEntry {
            path: path.display().to_string(),
            classification: classification.to_string(),
            message: message.into(),
            at: Utc::now(),
        };
        if let Ok(mut ring) = self.errors.lock() {
            if ring.len() == self.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(entry);
        }
    }

    /// Copy-on-read snapshot. Safe to call from any task at any time.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let recent_errors = self
            .errors
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default();
        MetricsSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            extraction_failed: self.extraction_failed.load(Ordering::Relaxed),
            write_failed: self.write_failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            orphan_candidates: self.orphan_candidates.load(Ordering::Relaxed),
            avg_extract_ms: avg_ms(
                self.extract_nanos.load(Ordering::Relaxed),
                self.extract_samples.load(Ordering::Relaxed),
            ),
            avg_write_ms: avg_ms(
                self.write_nanos.load(Ordering::Relaxed),
                self.write_samples.load(Ordering::Relaxed),
            ),
            recent_errors,
        }
    }
}

fn avg_ms(nanos: u64, samples: u64) -> f64 {
    if samples == 0 {
        0.0
    } else {
        nanos as f64 / samples as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub discovered: u64,
    pub skipped: u64,
    pub processed: u64,
    pub extraction_failed: u64,
    pub write_failed: u64,
    pub duplicates: u64,
    pub orphan_candidates: u64,
    pub avg_extract_ms: f64,
    pub avg_write_ms: f64,
    pub recent_errors: Vec<ErrorEntry>,
}

impl MetricsSnapshot {
    pub fn failed(&self) -> u64 {
        self.extraction_failed + self.write_failed
    }

    /// Every item that reached a terminal outcome.
    pub fn total_completed(&self) -> u64 {
        self.processed + self.failed() + self.duplicates
    }

    pub fn into_report(
        self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
        clean_drain: bool,
    ) -> FinalReport {
        let total = self.total_completed();
        let duration_secs = duration.as_secs_f64();
        FinalReport {
            total,
            processed: self.processed,
            failed: self.failed(),
            skipped_duplicates: self.duplicates,
            orphan_candidates: self.orphan_candidates,
            duration_secs,
            throughput_per_sec: if duration_secs > 0.0 {
                total as f64 / duration_secs
            } else {
                0.0
            },
            started_at,
            finished_at,
            clean_drain,
        }
    }
}
