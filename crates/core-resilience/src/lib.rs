//! Steadfast Core Resilience: Pure-logic retry primitives
//!
//! # Overview
//!
//! This crate provides the pacing logic used when an external service fails
//! transiently and the caller wants to try again:
//!
//! - **Retry Policy**: attempt ceilings, elapsed-time budgets and backoff shape
//! - **Backoff**: exponential delays capped at a maximum, with optional jitter
//! - **Retry Budget**: per-operation failure accounting that answers
//!   "retry after N ms" or "give up"
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Storage systems or object stores
//! - Network protocols (S3, HTTP)
//! - What the retried operation actually does
//!
//! Callers own the sleeping and the operation; the budget only decides.
//!
//! # Usage Example
//!
//! ```
//! use steadfast_core_resilience::{RetryBudget, RetryDecision, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy {
//!     max_attempts: Some(3),
//!     initial_backoff: Duration::from_millis(100),
//!     jitter_factor: 0.0,
//!     ..Default::default()
//! };
//!
//! let mut budget = RetryBudget::new();
//! assert_eq!(
//!     budget.record_failure(&policy),
//!     RetryDecision::Retry { attempt: 1, delay: Duration::from_millis(100) }
//! );
//! assert_eq!(
//!     budget.record_failure(&policy),
//!     RetryDecision::Retry { attempt: 2, delay: Duration::from_millis(200) }
//! );
//! assert_eq!(budget.record_failure(&policy), RetryDecision::Exhausted { attempts: 3 });
//! ```

pub mod retry;

// Re-export main types for convenience
pub use retry::{PolicyError, RetryBudget, RetryDecision, RetryPolicy};

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::retry::{PolicyError, RetryBudget, RetryDecision, RetryPolicy};
}
