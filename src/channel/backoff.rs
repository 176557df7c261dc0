use crate::config::ChannelConfig;
use std::time::Duration;
use tracing::{debug, info};

/// Reconnect schedule for the service channel
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for the exponential delay
    pub max_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            attempts: 0,
        }
    }

    /// Delay before the next attempt; doubles each time up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.calculate_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        debug!("Reconnect attempt {} scheduled in {:?}", self.attempts, delay);
        delay
    }

    /// Forget past failures after a successful connect
    pub fn reset(&mut self) {
        if self.attempts > 0 {
            info!("Channel recovered after {} failed attempts", self.attempts);
        }
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        let delay = Duration::from_millis(delay_ms);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }
}

impl From<&ChannelConfig> for ReconnectPolicy {
    fn from(config: &ChannelConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_base_ms),
            Duration::from_millis(config.reconnect_max_ms),
        )
    }
}
