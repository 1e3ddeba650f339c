use qfs_common::AppConfig;
use std::time::Duration;

use crate::types::Stage;

/// Bounded retry and deadline policy applied to every delegate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Deadline for a single extract or synthesize attempt
    pub call_timeout: Duration,

    /// Deadline for a single critique attempt, which spans several model calls
    pub critique_timeout: Duration,

    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            call_timeout: Duration::from_secs(120),
            critique_timeout: Duration::from_secs(360),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.delegate_max_retries,
            call_timeout: Duration::from_secs(config.delegate_timeout_secs),
            critique_timeout: Duration::from_secs(config.critic_timeout_secs),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Same deadline for every stage
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.critique_timeout = call_timeout;
        self
    }

    pub fn with_critique_timeout(mut self, critique_timeout: Duration) -> Self {
        self.critique_timeout = critique_timeout;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Deadline for one attempt of `stage`
    pub fn timeout_for(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Critique => self.critique_timeout,
            Stage::Extract | Stage::Synthesize => self.call_timeout,
        }
    }

    /// Total attempts per call, at least one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}
