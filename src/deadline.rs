//! Deadline (timeout) pattern with cooperative cancellation
//!
//! [`Deadline::run`] races a unit of work against a timer. If the work
//! finishes first its result is returned; if the timer fires first the
//! caller gets [`DeadlineError::TimedOut`] straight away and the work's
//! [`StopSignal`] is triggered so it can exit gracefully.
//!
//! The work is never killed. If it ignores its signal it keeps running after
//! the deadline and whatever it eventually returns is discarded.
//!
//! # Example
//!
//! ```
//! use breakwater::{Deadline, DeadlineError};
//! use std::time::Duration;
//!
//! let deadline = Deadline::new(Duration::from_millis(5));
//!
//! let result = deadline.run(|stop| {
//!     while !stop.is_stopped() {
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//!     Ok::<_, std::io::Error>(())
//! });
//!
//! assert!(matches!(result, Err(DeadlineError::TimedOut)));
//! ```

use crate::error::DeadlineError;
use crossbeam_channel::{after, bounded, select};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Read-only view of the cancellation requested when a deadline passes
///
/// The signal fires at most once and every clone observes it.
#[derive(Debug, Clone)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Returns `true` once the deadline has passed
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the deadline has passed
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}

/// Bounds how long a caller waits for a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    timeout: Duration,
}

impl Deadline {
    /// Create a new deadline with the given timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Get the timeout applied to each run
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `work` on its own thread, waiting at most for the timeout
    ///
    /// A panic in `work` before the deadline is resumed on the caller's
    /// thread; after the deadline it is dropped along with the result.
    pub fn run<F, T, E>(&self, work: F) -> Result<T, DeadlineError<E>>
    where
        F: FnOnce(StopSignal) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let token = CancellationToken::new();
        let signal = StopSignal::new(token.clone());
        let (result_tx, result_rx) = bounded(1);

        thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(signal)));
            // Nobody is listening once the deadline has passed
            let _ = result_tx.send(outcome);
        });

        select! {
            recv(result_rx) -> msg => match msg {
                Ok(Ok(result)) => result.map_err(DeadlineError::Inner),
                Ok(Err(payload)) => panic::resume_unwind(payload),
                Err(_) => Err(DeadlineError::Cancelled),
            },
            recv(after(self.timeout)) -> _ => {
                token.cancel();
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Deadline passed, signalled work to stop"
                );
                Err(DeadlineError::TimedOut)
            },
        }
    }

    /// Run the future produced by `work` as a tokio task, waiting at most for the timeout
    ///
    /// The task is detached rather than aborted when the deadline passes.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub async fn run_async<F, Fut, T, E>(&self, work: F) -> Result<T, DeadlineError<E>>
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(work(StopSignal::new(token.clone())));

        tokio::select! {
            biased;

            joined = handle => match joined {
                Ok(result) => result.map_err(DeadlineError::Inner),
                Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
                Err(_) => Err(DeadlineError::Cancelled),
            },
            _ = tokio::time::sleep(self.timeout) => {
                token.cancel();
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Deadline passed, signalled task to stop"
                );
                Err(DeadlineError::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Instant;

    #[derive(Debug, PartialEq)]
    struct WorkError;

    #[test]
    fn test_deadline_success() {
        let deadline = Deadline::new(Duration::from_millis(50));

        let start = Instant::now();
        let result = deadline.run(|_stop| {
            thread::sleep(Duration::from_millis(1));
            Ok::<_, WorkError>(7)
        });

        assert_eq!(result.unwrap(), 7);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_deadline_passes_work_error_through() {
        let deadline = Deadline::new(Duration::from_millis(50));

        let result = deadline.run(|_stop| Err::<(), _>(WorkError));
        assert_eq!(result.unwrap_err().into_inner(), Some(WorkError));
    }

    #[test]
    fn test_deadline_timeout() {
        let deadline = Deadline::new(Duration::from_millis(5));

        let start = Instant::now();
        let result = deadline.run(|_stop| {
            thread::sleep(Duration::from_secs(1));
            Ok::<_, WorkError>(())
        });

        assert!(result.unwrap_err().is_timed_out());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_stop_signal_fires_on_timeout() {
        let deadline = Deadline::new(Duration::from_millis(5));
        let (stopped_tx, stopped_rx) = bounded(1);

        let result = deadline.run(move |stop| {
            while !stop.is_stopped() {
                thread::sleep(Duration::from_millis(1));
            }
            let _ = stopped_tx.send(());
            Ok::<_, WorkError>(())
        });

        assert!(result.unwrap_err().is_timed_out());
        assert!(stopped_rx.recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_stop_signal_not_fired_on_success() {
        let deadline = Deadline::new(Duration::from_millis(20));
        let (signal_tx, signal_rx) = bounded(1);

        let result = deadline.run(move |stop| {
            let _ = signal_tx.send(stop.clone());
            Ok::<_, WorkError>(())
        });
        assert!(result.is_ok());

        let stop = signal_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(40));
        assert!(!stop.is_stopped());
    }

    #[test]
    fn test_deadline_resumes_panic() {
        let deadline = Deadline::new(Duration::from_secs(1));

        let payload = panic::catch_unwind(|| {
            deadline.run(|_stop| -> Result<(), WorkError> { panic!("bar") })
        })
        .expect_err("panic should reach the caller");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"bar"));
    }

    #[tokio::test]
    async fn test_run_async_success() {
        let deadline = Deadline::new(Duration::from_millis(50));

        let result = deadline
            .run_async(|_stop| async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok::<_, WorkError>("done")
            })
            .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_run_async_timeout_signals_task() {
        let deadline = Deadline::new(Duration::from_millis(5));
        let (stopped_tx, stopped_rx) = tokio::sync::oneshot::channel();

        let start = Instant::now();
        let result = deadline
            .run_async(|stop| async move {
                stop.stopped().await;
                let _ = stopped_tx.send(());
                Ok::<_, WorkError>(())
            })
            .await;

        assert!(result.unwrap_err().is_timed_out());
        assert!(start.elapsed() < Duration::from_millis(500));
        tokio::time::timeout(Duration::from_secs(1), stopped_rx)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_async_resumes_panic() {
        let deadline = Deadline::new(Duration::from_secs(1));

        let outcome = AssertUnwindSafe(deadline.run_async(|_stop| async {
            if true {
                panic!("baz");
            }
            Ok::<(), WorkError>(())
        }))
        .catch_unwind()
        .await;
        assert!(outcome.is_err());
    }
}
