//! Pipeline lifecycle: Starting → Running → Draining → Stopped.
//!
//! The supervisor owns every stage. Startup validates both stores and fails
//! fast. Shutdown is cooperative: cancelling the intake token stops
//! discovery, the closed work queue drains the pool, the closed result queue
//! drains the writer — a write mid-protocol is allowed to finish rather than
//! being torn down. Drain has an upper time bound; exceeding it (or a second
//! signal) forces a stop and is reported rather than crashing.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::data_model::FinalReport;
use crate::error::{PipelineError, Result};
use crate::extract::Extractor;
use crate::metrics::{MetricsAggregator, DEFAULT_ERROR_RING_CAPACITY};
use crate::pipeline::{work_queue, Discovery, DualStoreWriter, WorkerPool};
use crate::stores::{DetailStore, MetadataStore};

pub mod breaker;
pub mod cache;
pub mod heartbeat;

pub use breaker::CircuitBreaker;
pub use cache::SeenCache;
pub use heartbeat::Heartbeat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Stopped,
}

/// What a finished run hands back to the binary.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: FinalReport,
    pub forced_stop: bool,
}

pub struct Supervisor {
    config: IngestConfig,
    metadata: Arc<dyn MetadataStore>,
    details: Arc<dyn DetailStore>,
    extractor: Arc<dyn Extractor>,
    metrics: Arc<MetricsAggregator>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<SeenCache>,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(
        config: IngestConfig,
        metadata: Arc<dyn MetadataStore>,
        details: Arc<dyn DetailStore>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        let cache = Arc::new(SeenCache::new(config.cache_ttl()));
        Supervisor {
            metadata,
            details,
            extractor,
            metrics: Arc::new(MetricsAggregator::new(DEFAULT_ERROR_RING_CAPACITY)),
            breaker,
            cache,
            config,
            state: SupervisorState::Starting,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.metrics)
    }

    /// Runs one full ingest. `shutdown` starts a drain; `force` (or the
    /// drain timeout) stops immediately. Returns the terminal report, or an
    /// error for startup/fatal store failures.
    pub async fn run(
        &mut self,
        shutdown: CancellationToken,
        force: CancellationToken,
    ) -> Result<RunOutcome> {
        self.state = SupervisorState::Starting;
        self.validate_stores().await?;

        let started_at = Utc::now();
        let run_started = Instant::now();
        self.state = SupervisorState::Running;
        info!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity(),
            root = %self.config.root.display(),
            "pipeline running"
        );

        let intake = CancellationToken::new();
        let heartbeat_stop = CancellationToken::new();

        let (queue, source) = work_queue(self.config.queue_capacity());
        let (results_tx, results_rx) =
            mpsc::channel(self.config.queue_capacity());

        // Discovery owns the sole work-queue sender: when it finishes or is
        // cancelled, the closed channel is the pool's shutdown signal.
        let discovery = Discovery::new(
            self.config.root.clone(),
            &self.config.include_extensions,
            queue,
            Arc::clone(&self.metrics),
            Arc::clone(&self.breaker),
            intake.clone(),
        );
        let discovery_handle = tokio::spawn(discovery.run());

        let pool = WorkerPool::spawn(
            self.config.workers,
            source,
            Arc::clone(&self.extractor),
            results_tx,
            Arc::clone(&self.metrics),
            self.config.extract_timeout(),
        );

        let writer = DualStoreWriter::new(
            Arc::clone(&self.metadata),
            Arc::clone(&self.details),
            Arc::clone(&self.metrics),
            Arc::clone(&self.breaker),
            Arc::clone(&self.cache),
            self.config.company_id,
            self.config.store_timeout(),
        );
        let mut writer_handle = tokio::spawn(writer.run(results_rx));

        let heartbeat = Heartbeat::new(
            Arc::clone(&self.metadata),
            Arc::clone(&self.details),
            Arc::clone(&self.metrics),
            Arc::clone(&self.breaker),
            Arc::clone(&self.cache),
            self.config.heartbeat_interval(),
            self.config.max_reconnect_attempts,
            heartbeat_stop.clone(),
            intake.clone(),
        );
        let mut heartbeat_handle = tokio::spawn(heartbeat.run());

        let mut forced_stop = false;
        let mut fatal: Option<PipelineError> = None;
        let mut heartbeat_done = false;

        tokio::select! {
            _ = &mut writer_handle => {
                // Natural completion: discovery finished, pool drained, writer done.
            }
            _ = shutdown.cancelled() => {
                self.state = SupervisorState::Draining;
                info!(
                    drain_timeout_secs = self.config.drain_timeout_secs,
                    "shutdown signal received; stopping intake and draining in-flight work"
                );
                intake.cancel();
                forced_stop = self.drain(&mut writer_handle, &force).await;
            }
            res = &mut heartbeat_handle => {
                heartbeat_done = true;
                fatal = match res {
                    Ok(Err(e)) => Some(e),
                    Ok(Ok(())) => None,
                    Err(e) => Some(PipelineError::Unexpected(format!("heartbeat task failed: {}", e))),
                };
                self.state = SupervisorState::Draining;
                warn!("draining after fatal store loss");
                forced_stop = self.drain(&mut writer_handle, &force).await;
            }
        }

        if forced_stop {
            discovery_handle.abort();
            pool.abort();
            writer_handle.abort();
        } else {
            let _ = discovery_handle.await;
            pool.join().await;
        }
        heartbeat_stop.cancel();
        if !heartbeat_done {
            let _ = heartbeat_handle.await;
        }

        self.state = SupervisorState::Stopped;
        // The cache lives exactly as long as the run.
        self.cache.clear();

        let finished_at = Utc::now();
        let clean_drain = !forced_stop && fatal.is_none();
        let report = self.metrics.snapshot().into_report(
            started_at,
            finished_at,
            run_started.elapsed(),
            clean_drain,
        );
        match self.metadata.save_report(&report).await {
            Ok(run_id) => info!(run_id, "run report persisted"),
            Err(e) => warn!(error = %e, "failed to persist run report"),
        }
        info!(
            total = report.total,
            processed = report.processed,
            failed = report.failed,
            duplicates = report.skipped_duplicates,
            orphan_candidates = report.orphan_candidates,
            duration_secs = format!("{:.2}", report.duration_secs),
            throughput_per_sec = format!("{:.1}", report.throughput_per_sec),
            clean_drain = report.clean_drain,
            "ingest run complete"
        );

        if let Some(e) = fatal {
            return Err(e);
        }
        Ok(RunOutcome {
            report,
            forced_stop,
        })
    }

    /// Fail-fast startup validation of both store connections.
    async fn validate_stores(&self) -> Result<()> {
        let timeout = self.config.store_timeout();
        tokio::time::timeout(timeout, self.metadata.ping())
            .await
            .map_err(|_| {
                PipelineError::StoreUnavailable(format!(
                    "relational store ping timed out after {:?}",
                    timeout
                ))
            })?
            .map_err(|e| {
                PipelineError::StoreUnavailable(format!("relational store unreachable: {}", e))
            })?;
        tokio::time::timeout(timeout, self.details.ping())
            .await
            .map_err(|_| {
                PipelineError::StoreUnavailable(format!(
                    "document store ping timed out after {:?}",
                    timeout
                ))
            })?
            .map_err(|e| {
                PipelineError::StoreUnavailable(format!("document store unreachable: {}", e))
            })?;
        Ok(())
    }

    /// Waits for the writer to finish within the drain bound. Returns true
    /// when the stop had to be forced (timeout or second signal).
    async fn drain(&self, writer_handle: &mut JoinHandle<()>, force: &CancellationToken) -> bool {
        let bound = self.config.drain_timeout();
        tokio::select! {
            res = tokio::time::timeout(bound, writer_handle) => match res {
                Ok(_) => {
                    info!("drain complete; all in-flight work finished");
                    false
                }
                Err(_) => {
                    warn!(
                        drain_timeout_secs = bound.as_secs(),
                        "drain timed out with work still in flight; forcing stop"
                    );
                    true
                }
            },
            _ = force.cancelled() => {
                warn!("second shutdown signal; forcing immediate stop — in-flight work may be lost");
                true
            }
        }
    }
}
