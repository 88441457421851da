//! Rolling-window circuit breaker over write-unit outcomes.
//!
//! Once the window is full and the failure rate crosses the threshold, the
//! breaker opens for a cooldown period, during which discovery pauses intake.
//! Opening clears the window so the breaker needs fresh evidence to re-open
//! after the cooldown expires.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::BreakerConfig;

pub struct CircuitBreaker {
    window: usize,
    threshold: f64,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

struct BreakerInner {
    outcomes: VecDeque<bool>,
    failures: usize,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        CircuitBreaker {
            window: config.window.max(1),
            threshold: config.failure_threshold,
            cooldown: config.cooldown(),
            inner: Mutex::new(BreakerInner {
                outcomes: VecDeque::new(),
                failures: 0,
                open_until: None,
            }),
        }
    }

    /// Records one unit outcome and opens the breaker when the windowed
    /// failure rate crosses the threshold.
    pub fn record(&self, ok: bool) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.outcomes.push_back(ok);
        if !ok {
            inner.failures += 1;
        }
        if inner.outcomes.len() > self.window {
            if let Some(oldest) = inner.outcomes.pop_front() {
                if !oldest {
                    inner.failures -= 1;
                }
            }
        }

        let already_open = matches!(inner.open_until, Some(until) if until > Instant::now());
        if !already_open && inner.outcomes.len() == self.window {
            let rate = inner.failures as f64 / self.window as f64;
            if rate >= self.threshold {
                warn!(
                    failure_rate = rate,
                    cooldown_secs = self.cooldown.as_secs(),
                    "circuit breaker opened; pausing intake"
                );
                inner.open_until = Some(Instant::now() + self.cooldown);
                inner.outcomes.clear();
                inner.failures = 0;
            }
        }
    }

    pub fn is_open(&self) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        match inner.open_until {
            Some(until) if until > Instant::now() => true,
            Some(_) => {
                inner.open_until = None;
                false
            }
            None => false,
        }
    }

    /// Failure rate over the current window. Zero until evidence arrives.
    pub fn failure_rate(&self) -> f64 {
        let Ok(inner) = self.inner.lock() else {
            return 0.0;
        };
        if inner.outcomes.is_empty() {
            0.0
        } else {
            inner.failures as f64 / inner.outcomes.len() as f64
        }
    }
}
