//! Reconnect policy with jittered exponential back-off.

use std::time::Duration;

use rand::Rng;
use tl_domain::config::ReconnectConfig;

/// Controls how a node's event socket reconnects after a drop.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (cap).
    pub max_delay: Duration,
    /// Multiplier applied after each failed attempt.
    pub backoff_factor: f64,
    /// Maximum number of consecutive failures before giving up.
    /// `0` means unlimited retries.
    pub max_attempts: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectBackoff {
    fn from(cfg: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff_factor: cfg.backoff_factor.max(1.0),
            max_attempts: cfg.max_attempts,
        }
    }
}

impl ReconnectBackoff {
    /// Compute the delay for the given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped_ms = self.base_delay_ms(attempt);

        // Up to 25% jitter so a fleet of clients doesn't reconnect in lockstep.
        let jitter = capped_ms * 0.25 * rand::rng().random::<f64>();
        Duration::from_millis((capped_ms + jitter) as u64)
    }

    fn base_delay_ms(&self, attempt: u32) -> f64 {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = base_ms * self.backoff_factor.powi(exp);
        delay_ms.min(self.max_delay.as_millis() as f64)
    }

    /// Whether the given attempt number exceeds the max.
    pub fn should_give_up(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}
