//! Global rate gate: one minimum-interval cadence shared by every session.
//!
//! The gate is the only cross-session synchronization point in the system.
//! Every upstream call, from any session and any participant, waits for the
//! same slot sequence, so the provider-wide throughput ceiling holds no
//! matter how many debates run concurrently.
//!
//! The mutex guards only the slot computation. Sleeping happens after the
//! lock is released, so contending callers queue up on slots, not on each
//! other's waits. Grant order follows lock-acquisition order, which is not a
//! strict first-come-first-served guarantee.

use rand::Rng;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::DebateSettings;
use crate::engine::EngineError;

/// Upper bound in seconds of the random jitter added before each retry.
const RETRY_JITTER_MAX_SECS: f64 = 0.25;

static GLOBAL_GATE: OnceLock<Arc<RateGate>> = OnceLock::new();

/// Cross-session throttle plus retry wrapper for upstream calls.
pub struct RateGate {
    min_interval: Duration,
    max_retries: u32,
    /// Next instant a call may proceed. `None` until the first grant.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration, max_retries: u32) -> Self {
        Self {
            min_interval,
            max_retries,
            next_allowed: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &DebateSettings) -> Self {
        Self::new(settings.min_interval, settings.max_retries)
    }

    /// Process-wide gate, initialized on first use. Later calls return the
    /// same gate regardless of their settings, so setup is safe to repeat.
    pub fn global(settings: &DebateSettings) -> Arc<RateGate> {
        GLOBAL_GATE
            .get_or_init(|| Arc::new(Self::from_settings(settings)))
            .clone()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller's slot comes up.
    ///
    /// The next-allowed instant advances by `min_interval` from its previous
    /// value, not from now, so the cadence stays steady under burst
    /// contention.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait = {
            let mut next_allowed = self.next_allowed.lock().await;
            let now = Instant::now();
            match *next_allowed {
                Some(next) if now < next => {
                    *next_allowed = Some(next + self.min_interval);
                    next - now
                }
                _ => {
                    *next_allowed = Some(now + self.min_interval);
                    Duration::ZERO
                }
            }
        };
        if !wait.is_zero() {
            debug!(wait_secs = wait.as_secs_f64(), "rate gate waiting for slot");
            sleep(wait).await;
        }
    }

    /// Run `op` behind the gate, retrying rate-limit failures.
    ///
    /// Every attempt re-acquires the gate. The wait before a retry is the
    /// provider-suggested delay when the error carries one, else the gate
    /// interval, plus up to 250ms of jitter. Non-rate-limit errors and
    /// exhausted retries propagate the original error.
    pub async fn call_with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.acquire().await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if err.is_rate_limit() && attempt <= self.max_retries {
                        let delay = err.retry_after().unwrap_or(self.min_interval);
                        let jitter = Duration::from_secs_f64(
                            rand::thread_rng().gen_range(0.0..RETRY_JITTER_MAX_SECS),
                        );
                        warn!(
                            attempt,
                            max_retries = self.max_retries,
                            delay_secs = delay.as_secs_f64(),
                            "rate limit from provider, backing off"
                        );
                        sleep(delay + jitter).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}
