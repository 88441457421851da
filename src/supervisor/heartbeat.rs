//! Periodic liveness task: store connectivity checks with
//! exponential-backoff reconnect, cache expiry, and progress logging.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::metrics::MetricsAggregator;
use crate::stores::{DetailStore, MetadataStore, StoreError};
use crate::supervisor::{CircuitBreaker, SeenCache};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct Heartbeat {
    metadata: Arc<dyn MetadataStore>,
    details: Arc<dyn DetailStore>,
    metrics: Arc<MetricsAggregator>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<SeenCache>,
    interval: Duration,
    max_reconnect_attempts: u32,
    /// Cancelled by the supervisor when the run ends or drains.
    stop: CancellationToken,
    /// Cancelled by the heartbeat itself on fatal store loss, halting intake.
    intake: CancellationToken,
}

impl Heartbeat {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        details: Arc<dyn DetailStore>,
        metrics: Arc<MetricsAggregator>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<SeenCache>,
        interval: Duration,
        max_reconnect_attempts: u32,
        stop: CancellationToken,
        intake: CancellationToken,
    ) -> Self {
        Heartbeat {
            metadata,
            details,
            metrics,
            breaker,
            cache,
            interval,
            max_reconnect_attempts,
            stop,
            intake,
        }
    }

    /// Runs until stopped. Returns an error only on fatal store loss, i.e.
    /// connectivity that did not come back within the bounded reconnect
    /// policy.
    pub async fn run(self) -> Result<(), PipelineError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup validation
        // (already done by the supervisor) is not repeated at once.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.check_stores().await {
                warn!(error = %e, "store connectivity lost");
                if let Err(fatal) = self.reconnect().await {
                    error!(error = %fatal, "reconnect attempts exhausted; halting intake");
                    self.intake.cancel();
                    return Err(fatal);
                }
                if self.stop.is_cancelled() {
                    return Ok(());
                }
                info!("store connectivity restored");
            }

            let evicted = self.cache.invalidate_expired();
            let snapshot = self.metrics.snapshot();
            info!(
                discovered = snapshot.discovered,
                processed = snapshot.processed,
                failed = snapshot.failed(),
                duplicates = snapshot.duplicates,
                skipped = snapshot.skipped,
                orphan_candidates = snapshot.orphan_candidates,
                avg_extract_ms = format!("{:.1}", snapshot.avg_extract_ms),
                avg_write_ms = format!("{:.1}", snapshot.avg_write_ms),
                breaker_failure_rate = format!("{:.2}", self.breaker.failure_rate()),
                breaker_open = self.breaker.is_open(),
                cache_evicted = evicted,
                "ingest progress"
            );
        }
    }

    async fn check_stores(&self) -> Result<(), StoreError> {
        self.metadata.ping().await?;
        self.details.ping().await
    }

    async fn reconnect(&self) -> Result<(), PipelineError> {
        let mut delay = INITIAL_BACKOFF;
        for attempt in 1..=self.max_reconnect_attempts {
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "backing off before reconnect attempt"
            );
            tokio::select! {
                _ = self.stop.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
            if self.check_stores().await.is_ok() {
                return Ok(());
            }
            delay = (delay * 2).min(MAX_BACKOFF);
        }
        Err(PipelineError::StoreUnavailable(format!(
            "stores unreachable after {} reconnect attempts",
            self.max_reconnect_attempts
        )))
    }
}
