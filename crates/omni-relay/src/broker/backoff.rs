//! Reconnect delay policy.

use std::time::Duration;

use omni_settings::{ReconnectSettings, ReconnectStrategy};

/// Delay between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffPolicy {
    /// Same delay after every failure.
    Constant(Duration),
    /// `base * 2^attempt`, capped at `max`, scaled by `1 ± jitter`.
    Exponential {
        /// Delay after the first failure.
        base: Duration,
        /// Upper bound before jitter.
        max: Duration,
        /// Jitter fraction in `0.0..=1.0`.
        jitter: f64,
    },
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_random(attempt, rand::random::<f64>())
    }

    /// Delay with explicit randomness; `random` must be in `[0.0, 1.0)`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_with_random(&self, attempt: u32, random: f64) -> Duration {
        match *self {
            Self::Constant(delay) => delay,
            Self::Exponential { base, max, jitter } => {
                let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
                let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
                let capped = base_ms.saturating_mul(1u64 << attempt.min(31)).min(max_ms);
                // Maps random [0,1) to [-jitter, +jitter]
                let factor = 1.0 + (random * 2.0 - 1.0) * jitter;
                let ms = ((capped as f64) * factor).round().max(0.0) as u64;
                Duration::from_millis(ms)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&ReconnectSettings::default())
    }
}

impl From<&ReconnectSettings> for BackoffPolicy {
    fn from(s: &ReconnectSettings) -> Self {
        match s.strategy {
            ReconnectStrategy::Constant => Self::Constant(Duration::from_millis(s.delay_ms)),
            ReconnectStrategy::Exponential => Self::Exponential {
                base: Duration::from_millis(s.delay_ms),
                max: Duration::from_millis(s.max_delay_ms.max(s.delay_ms)),
                jitter: s.jitter_factor.clamp(0.0, 1.0),
            },
        }
    }
}
