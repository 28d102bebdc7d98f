//! Retry policy and budget accounting
//!
//! A [`RetryPolicy`] describes how hard to try: how many attempts, how long
//! to wait between them and how much wall-clock time one operation may burn.
//! A [`RetryBudget`] is the per-operation counter that consults the policy
//! after each failure and returns a [`RetryDecision`].
//!
//! Time is measured with `tokio::time::Instant`, so tests running under a
//! paused runtime see elapsed budgets advance with the mocked clock.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Errors produced when validating a policy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("backoff multiplier must be >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("initial backoff ({initial:?}) exceeds maximum backoff ({max:?})")]
    InitialExceedsMax { initial: Duration, max: Duration },

    #[error("jitter factor must be within [0.0, 1.0], got {0}")]
    InvalidJitter(f64),

    #[error("max_attempts must be at least 1 when set")]
    ZeroAttempts,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of consecutive failed attempts (None = unlimited)
    pub max_attempts: Option<u32>,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for the exponential part of the delay
    pub max_backoff: Duration,

    /// Multiplier applied per attempt
    pub backoff_multiplier: f64,

    /// Fraction of the delay added as random jitter (0.0 disables jitter)
    pub jitter_factor: f64,

    /// Maximum wall-clock time one operation may spend retrying (None = unlimited)
    pub max_elapsed: Option<Duration>,

    /// Give up immediately on errors the caller classifies as permanent
    pub fail_fast_on_permanent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.3,
            max_elapsed: None,
            fail_fast_on_permanent: true,
        }
    }
}

impl RetryPolicy {
    /// Retry forever, immediately, whatever the error.
    ///
    /// This reproduces the historical reopen loop and can hang a caller
    /// indefinitely against a permanently failing remote. Only use it when
    /// bit-for-bit compatibility with that behaviour is required.
    pub fn legacy_unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
            max_elapsed: None,
            fail_fast_on_permanent: false,
        }
    }

    /// Bounded retries with no delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    /// True when neither an attempt ceiling nor an elapsed budget is set
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.max_elapsed.is_none()
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(self.backoff_multiplier >= 1.0) {
            return Err(PolicyError::InvalidMultiplier(self.backoff_multiplier));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(PolicyError::InitialExceedsMax {
                initial: self.initial_backoff,
                max: self.max_backoff,
            });
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(PolicyError::InvalidJitter(self.jitter_factor));
        }
        if self.max_attempts == Some(0) {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(())
    }

    /// Deterministic delay before retry number `attempt` (1-based), capped at `max_backoff`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        if secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs)
    }

    /// Delay before retry number `attempt`, including jitter
    ///
    /// Jitter is added on top of the capped delay, so the result may exceed
    /// `max_backoff` by at most `jitter_factor` of it. Factors that were never
    /// validated are tolerated: NaN or non-positive disables jitter, anything
    /// above 1.0 is treated as 1.0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let capped = self.base_delay(attempt);
        if self.jitter_factor.is_nan() || self.jitter_factor <= 0.0 || capped.is_zero() {
            return capped;
        }

        let factor = self.jitter_factor.min(1.0);
        let jitter = rand::rng().random_range(0.0..factor);
        capped + Duration::from_secs_f64(capped.as_secs_f64() * jitter)
    }
}

/// Outcome of recording a failure against a budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt + 1`
    Retry { attempt: u32, delay: Duration },

    /// Stop; `attempts` consecutive failures were recorded
    Exhausted { attempts: u32 },
}

/// Failure accounting for a single logical operation
#[derive(Debug, Clone)]
pub struct RetryBudget {
    failures: u32,
    started: Instant,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryBudget {
    /// Start a fresh budget; the elapsed clock starts now
    pub fn new() -> Self {
        Self {
            failures: 0,
            started: Instant::now(),
        }
    }

    /// Consecutive failures recorded so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Time since the budget was started or last reset
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record one failed attempt and decide what to do next
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);

        if let Some(max) = policy.max_attempts {
            if self.failures >= max {
                return RetryDecision::Exhausted {
                    attempts: self.failures,
                };
            }
        }

        if let Some(max_elapsed) = policy.max_elapsed {
            if self.started.elapsed() >= max_elapsed {
                tracing::debug!(
                    failures = self.failures,
                    elapsed_ms = self.started.elapsed().as_millis() as u64,
                    "retry budget elapsed"
                );
                return RetryDecision::Exhausted {
                    attempts: self.failures,
                };
            }
        }

        RetryDecision::Retry {
            attempt: self.failures,
            delay: policy.delay_for(self.failures),
        }
    }

    /// Forget recorded failures after the operation made progress
    pub fn reset(&mut self) {
        self.failures = 0;
        self.started = Instant::now();
    }
}
