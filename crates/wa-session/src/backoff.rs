//! Reconnect policy: exponential backoff with a retry cap.

use std::time::Duration;

use rand::Rng;

/// How the session recovers from an unexpected disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts
    pub multiplier: f64,
    /// Consecutive attempts before giving up (0 disables auto-reconnect)
    pub max_attempts: u32,
    /// Random spread applied to each delay, as a fraction (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: 10,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects on its own.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Whether attempt number `attempt` (1-based) is within the cap.
    pub fn allows(&self, attempt: u32) -> bool {
        (1..=self.max_attempts).contains(&attempt)
    }

    /// Backoff before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max = self.max_delay.as_secs_f64();
        let base = (self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent)).min(max);

        let secs = if self.jitter > 0.0 {
            let spread = self.jitter.min(1.0);
            let factor = rand::rng().random_range(-spread..=spread);
            (base * (1.0 + factor)).clamp(0.0, max)
        } else {
            base
        };

        Duration::from_secs_f64(secs)
    }
}
