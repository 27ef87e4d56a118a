use std::time::Duration;

/// High-level classification of a failed chunk attempt for retry purposes.
///
/// This intentionally stays generic; callers map transfer errors, HTTP
/// status codes, or IO failures into these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Attempt timed out (connect/send).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Failed to read the chunk from the local source file.
    LocalIo,
    /// Any other error (not retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this chunk; it has permanently failed.
    NoRetry,
    /// Re-enqueue the chunk, eligible after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
///
/// The budget counts attempts, so `max_attempts: 3` allows two retries
/// after the initial attempt before a chunk is marked failed.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts per chunk (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Compute the backoff for a chunk whose `attempt`-th try just failed.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns
    /// `RetryDecision::NoRetry` when the budget is spent or the error kind
    /// is permanent.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Other => RetryDecision::NoRetry,
            ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::Throttled
            | ErrorKind::LocalIo
            | ErrorKind::Http5xx(_) => {
                // base * 2^(attempt-1), capped at max_delay.
                let exp = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
                let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay_of(d: RetryDecision) -> Duration {
        match d {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry"),
        }
    }

    #[test]
    fn permanent_kinds_never_retry() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let p = RetryPolicy {
            max_attempts: 20,
            ..Default::default()
        };
        let d1 = delay_of(p.decide(1, ErrorKind::Timeout));
        let d2 = delay_of(p.decide(2, ErrorKind::Connection));
        assert_eq!(d1, Duration::from_millis(250));
        assert_eq!(d2, Duration::from_millis(500));

        let d_late = delay_of(p.decide(12, ErrorKind::Throttled));
        assert_eq!(d_late, p.max_delay);
    }

    #[test]
    fn default_budget_allows_two_retries() {
        let p = RetryPolicy::default();
        // A chunk that fails twice may try a third time; a third failure
        // exhausts the budget.
        assert!(matches!(
            p.decide(1, ErrorKind::Http5xx(502)),
            RetryDecision::RetryAfter(_)
        ));
        assert!(matches!(
            p.decide(2, ErrorKind::Http5xx(502)),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(3, ErrorKind::Http5xx(502)), RetryDecision::NoRetry);
    }

    #[test]
    fn local_io_is_retried() {
        let p = RetryPolicy::default();
        assert!(matches!(
            p.decide(1, ErrorKind::LocalIo),
            RetryDecision::RetryAfter(_)
        ));
    }
}
