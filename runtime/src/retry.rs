//! Backoff schedule for version-mismatch retries.
//!
//! The allocator retries a conditional update only when another writer got
//! there first. Each retry waits `base_delay * multiplier^attempt`
//! (zero-indexed attempt), capped at `max_delay`, optionally with jitter.
//!
//! # Example
//!
//! ```rust
//! use ticketboss_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .base_delay(Duration::from_millis(10))
//!     .max_delay(Duration::from_secs(1))
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
//! assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(80));
//! ```

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `base_delay`: 10ms
/// - `max_delay`: 1 second
/// - `multiplier`: 2.0 (delay doubles each retry)
/// - `jitter`: off
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Randomize each delay within `[delay / 2, delay]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            base_delay: None,
            max_delay: None,
            multiplier: None,
            jitter: None,
        }
    }

    /// Calculate the un-jittered delay after failed attempt `attempt`.
    ///
    /// `delay = base_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }

        Duration::from_millis(delay_ms as u64)
    }

    /// Delay to actually wait, with jitter applied if enabled.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let half = delay / 2;
        let spread = u64::try_from((delay - half).as_micros()).unwrap_or(u64::MAX);
        half + Duration::from_micros(rand::thread_rng().gen_range(0..=spread))
    }

    /// Sleep for the backoff after failed attempt `attempt`.
    pub async fn backoff(&self, attempt: u32) {
        sleep(self.backoff_delay(attempt)).await;
    }

    /// Whether another attempt is allowed after the zero-indexed `attempt` failed.
    #[must_use]
    pub const fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Worst-case total time spent sleeping across a fully exhausted loop.
    #[must_use]
    pub fn worst_case_backoff(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts (at least 1 is used).
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set delay after the first failed attempt.
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}
