//! Error types for the resilience primitives
//!
//! Each primitive wraps the guarded operation's own error type `E` so that
//! the sentinel it originates (breaker open, timed out) can never be confused
//! with an error produced by the operation itself.

use thiserror::Error;

/// Outcome of a call guarded by a [`Breaker`](crate::Breaker) that did not succeed.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker was open; the guarded operation was not invoked.
    #[error("circuit breaker is open")]
    Open,

    /// The guarded operation ran and returned an error.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Inner(e) => Some(e),
        }
    }
}

/// Outcome of a [`Deadline`](crate::Deadline) run that did not succeed.
#[derive(Debug, Error)]
pub enum DeadlineError<E> {
    /// The deadline passed before the work finished.
    #[error("timed out waiting for function to finish")]
    TimedOut,

    /// The async runtime dropped the work before it finished or timed out.
    #[error("work was cancelled by the runtime before it finished")]
    Cancelled,

    /// The work finished in time and returned an error.
    #[error(transparent)]
    Inner(E),
}

impl<E> DeadlineError<E> {
    /// Returns `true` if the deadline expired first.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, DeadlineError::TimedOut)
    }

    /// The work's own error, if it finished in time.
    pub fn into_inner(self) -> Option<E> {
        match self {
            DeadlineError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Invalid [`BreakerConfig`](crate::BreakerConfig) values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("error_threshold must be greater than zero")]
    ZeroErrorThreshold,

    #[error("success_threshold must be greater than zero")]
    ZeroSuccessThreshold,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}
