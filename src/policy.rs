//! Backoff and anti-bot policy.
//!
//! Supplies the randomized pacing used between interactive browser
//! actions, picks the session identity from the user-agent pool, and
//! drives bounded exponential-backoff retries for transient retrieval
//! failures. Non-retryable failures (a challenge page, cancellation) are
//! surfaced immediately.

use crate::cancel::CancelFlag;
use crate::config::PolicyConfig;
use crate::error::RetrievalError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const FALLBACK_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                           (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Immutable pacing/identity/retry policy for one deployment.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    cfg: PolicyConfig,
}

impl BackoffPolicy {
    pub fn new(cfg: PolicyConfig) -> Self {
        Self { cfg }
    }

    /// A randomized pause drawn from the configured pacing range.
    pub fn pause(&self) -> Duration {
        let min = self.cfg.pacing_min_ms.min(self.cfg.pacing_max_ms);
        let max = self.cfg.pacing_max_ms.max(self.cfg.pacing_min_ms);
        let ms = rand::thread_rng().gen_range(min..=max);
        Duration::from_millis(ms)
    }

    /// Pick a session user-agent from the pool.
    pub fn user_agent(&self) -> &str {
        self.cfg
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_UA)
    }

    /// Backoff delay before retry number `attempt` (0-based), exponential
    /// with jitter in the upper half of the window, capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .cfg
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.cfg.backoff_max_ms);
        let ms = if exp <= 1 {
            exp
        } else {
            rand::thread_rng().gen_range(exp / 2..=exp)
        };
        Duration::from_millis(ms)
    }

    pub fn max_retries(&self) -> u32 {
        self.cfg.max_retries
    }

    /// Run `op` with bounded retries on retryable failures.
    ///
    /// The backoff sleep is a cancellation suspension point; cancellation
    /// during the wait surfaces as [`RetrievalError::Cancelled`].
    /// Exhausting the retry budget returns the last error.
    pub async fn retry<T, F, Fut>(
        &self,
        cancel: &CancelFlag,
        mut op: F,
    ) -> Result<T, RetrievalError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RetrievalError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.cfg.max_retries {
                        return Err(err);
                    }
                    let delay = self.retry_delay(attempt);
                    warn!(
                        attempt,
                        max_retries = self.cfg.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient retrieval failure, backing off"
                    );
                    if !cancel.sleep(delay).await {
                        return Err(RetrievalError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
