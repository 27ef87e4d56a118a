//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures, local read errors) and exponential backoff
//! decisions so the scheduler can apply one consistent policy to every
//! failed chunk attempt.

mod classify;
mod policy;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
