//! Directory discovery: walks the scan root and feeds the work queue.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::data_model::WorkItem;
use crate::metrics::MetricsAggregator;
use crate::pipeline::queue::WorkQueue;
use crate::supervisor::CircuitBreaker;

/// How often a paused discovery re-checks the circuit breaker.
const BREAKER_POLL: Duration = Duration::from_millis(250);

pub struct Discovery {
    root: PathBuf,
    extensions: Vec<String>,
    queue: WorkQueue,
    metrics: Arc<MetricsAggregator>,
    breaker: Arc<CircuitBreaker>,
    intake: CancellationToken,
}

impl Discovery {
    pub fn new(
        root: PathBuf,
        extensions: &[String],
        queue: WorkQueue,
        metrics: Arc<MetricsAggregator>,
        breaker: Arc<CircuitBreaker>,
        intake: CancellationToken,
    ) -> Self {
        Discovery {
            root,
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            queue,
            metrics,
            breaker,
            intake,
        }
    }

    /// Walks the tree, enqueuing one `WorkItem` per allow-listed file.
    /// Unsupported files are skipped and counted, never treated as errors.
    /// Blocks on a full queue (backpressure) and pauses while the circuit
    /// breaker is open. Returns the number of items enqueued.
    pub async fn run(self) -> u64 {
        let mut enqueued = 0u64;
        info!(root = %self.root.display(), "starting discovery scan");

        for entry in WalkDir::new(&self.root).into_iter() {
            if self.intake.is_cancelled() {
                info!(enqueued, "discovery cancelled; intake stopped");
                return enqueued;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry; skipping");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let extension = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            if !self.extensions.contains(&extension) {
                debug!(path = %entry.path().display(), "unsupported extension; skipping");
                self.metrics.inc_skipped();
                continue;
            }

            // Pause intake while the breaker is open rather than piling more
            // work onto a failing store.
            while self.breaker.is_open() {
                debug!("circuit breaker open; intake paused");
                tokio::select! {
                    _ = self.intake.cancelled() => {
                        info!(enqueued, "discovery cancelled while paused");
                        return enqueued;
                    }
                    _ = tokio::time::sleep(BREAKER_POLL) => {}
                }
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let item = WorkItem {
                path: entry.path().to_path_buf(),
                size,
                discovered_at: Utc::now(),
            };

            let sent = tokio::select! {
                _ = self.intake.cancelled() => {
                    info!(enqueued, "discovery cancelled mid-enqueue");
                    return enqueued;
                }
                sent = self.queue.enqueue(item) => sent,
            };
            if !sent {
                warn!(enqueued, "work queue closed; stopping discovery");
                return enqueued;
            }
            self.metrics.inc_discovered();
            enqueued += 1;
        }

        info!(enqueued, "discovery scan complete");
        enqueued
    }
}
