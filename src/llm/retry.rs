//! Retry wrapper for completion clients.
//!
//! Two policies exist. `classified` retries only transient failures
//! (transport, rate limit, 5xx) with capped exponential backoff plus jitter
//! and gives up after a bounded number of attempts; everything else is
//! returned at once. `legacy` waits a fixed 15 seconds and retries every
//! error forever.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use super::client::LlmClient;
use super::error::LlmError;

pub const LEGACY_RETRY_DELAY: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` retries forever.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Extra random delay, as a fraction of the computed backoff.
    pub jitter: f64,
    /// Retry non-transient errors too.
    pub retry_all: bool,
    /// Keep the delay at `base_delay` instead of doubling it.
    pub fixed: bool,
}

impl RetryPolicy {
    pub fn classified(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter: f64,
    ) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: jitter.clamp(0.0, 1.0),
            retry_all: false,
            fixed: false,
        }
    }

    pub fn legacy() -> Self {
        Self {
            max_attempts: None,
            base_delay: LEGACY_RETRY_DELAY,
            max_delay: LEGACY_RETRY_DELAY,
            jitter: 0.0,
            retry_all: true,
            fixed: true,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if self.fixed {
            return self.base_delay;
        }
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::from_secs_f64(extra)
    }

    fn should_retry(&self, err: &anyhow::Error, attempt: u32) -> bool {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return false;
            }
        }
        if self.retry_all {
            return true;
        }
        err.downcast_ref::<LlmError>()
            .map(LlmError::is_retryable)
            .unwrap_or(false)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::classified(6, Duration::from_secs(2), Duration::from_secs(60), 0.25)
    }
}

/// Source of delays, swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl<C: LlmClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleeper: Box::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RetryingClient<C> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if !self.policy.should_retry(&err, attempt) {
                        if attempt > 1 {
                            warn!("Completion failed after {} attempt(s): {}", attempt, err);
                        }
                        return Err(err);
                    }
                    let delay = self.policy.delay_with_jitter(attempt);
                    warn!(
                        "Completion attempt {} failed ({}), retrying in {:.1}s",
                        attempt,
                        err,
                        delay.as_secs_f64()
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}
