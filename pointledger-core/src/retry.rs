//! Bounded retry policy for storage handle acquisition
//!
//! Transient acquisition failures (pool exhaustion, connect errors) are
//! retried here; every other error propagates unmodified. The policy is a
//! plain value injected into the connection provider, so tests substitute
//! a zero-delay variant.

use crate::error::{Error, Result};
use std::time::Duration;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt with no delay (fail straight through)
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Zero-delay variant of this policy, for tests
    pub fn without_delay(self) -> Self {
        RetryPolicy {
            delay: Duration::ZERO,
            ..self
        }
    }

    /// Run `attempt` until it succeeds or the budget is exhausted.
    ///
    /// Exhaustion yields [`Error::Unavailable`] carrying the last failure;
    /// `what` names the resource being acquired.
    pub fn run<T, F>(&self, what: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_cause = String::new();

        for n in 1..=attempts {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        attempt = n,
                        max_attempts = attempts,
                        error = %err,
                        "{} failed",
                        what
                    );
                    last_cause = err.to_string();
                    if n < attempts && !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
            }
        }

        Err(Error::Unavailable {
            what: what.to_string(),
            attempts,
            cause: last_cause,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_passes_through() {
        let policy = RetryPolicy::default().without_delay();
        let result: Result<i32> = policy.run("probe", || Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_recovers_within_budget() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let mut calls = 0;
        let result = policy.run("probe", || {
            calls += 1;
            if calls < 3 {
                Err(Error::Repository("not yet".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_exhaustion_surfaces_unavailable() {
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
        };
        let mut calls = 0;
        let result: Result<()> = policy.run("postgres connection", || {
            calls += 1;
            Err(Error::Repository("refused".to_string()))
        });
        assert_eq!(calls, 2);
        match result {
            Err(Error::Unavailable { attempts, cause, .. }) => {
                assert_eq!(attempts, 2);
                assert!(cause.contains("refused"));
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}
