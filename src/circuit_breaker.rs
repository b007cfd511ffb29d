//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker stops calling a failing operation until it appears to
//! have recovered. It has three states:
//! - Closed: Normal operation, calls pass through and failures are counted
//! - Open: Operation is unhealthy, calls are rejected without running
//! - HalfOpen: Probe calls pass through to test whether the operation recovered
//!
//! Only failures that land within `timeout` of the previous failure count
//! toward opening the circuit, so sparse isolated failures never trip it.
//! The same `timeout` is the cool-down spent in Open. The Open → HalfOpen
//! transition is evaluated lazily whenever the state is touched; there is no
//! background timer.
//!
//! Every call path counts a panic in the guarded operation as a failure.
//! The synchronous paths ([`Breaker::run`], [`Breaker::call`]) resume the
//! panic once it has been counted; the fire-and-forget paths
//! ([`Breaker::go`], [`Breaker::spawn`]) log it and drop it.

use crate::config::BreakerConfig;
use crate::error::{BreakerError, ConfigError};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally
    Closed,
    /// Circuit is open, calls are rejected immediately
    Open,
    /// Circuit is half-open, probe calls test for recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Internal state of the circuit breaker, always accessed under one lock
#[derive(Debug)]
struct CircuitBreakerState {
    /// Current state of the circuit
    state: CircuitState,
    /// Consecutive failure count (closed only)
    error_count: u32,
    /// Consecutive success count (half-open only)
    success_count: u32,
    /// When the most recent counted failure happened
    last_error_at: Option<Instant>,
    /// When the circuit entered its current state
    state_changed_at: Instant,
}

impl CircuitBreakerState {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            error_count: 0,
            success_count: 0,
            last_error_at: None,
            state_changed_at: now,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.state_changed_at = now;
        self.error_count = 0;
        self.success_count = 0;
    }

    /// Move Open to HalfOpen once the cool-down has elapsed
    fn refresh(&mut self, now: Instant, config: &BreakerConfig) {
        if self.state == CircuitState::Open
            && now.saturating_duration_since(self.state_changed_at) >= config.timeout
        {
            self.transition(CircuitState::HalfOpen, now);
            debug!("Circuit breaker half-open, admitting probe calls");
        }
    }

    fn record_success(&mut self, now: Instant, config: &BreakerConfig) {
        self.refresh(now, config);

        match self.state {
            CircuitState::Closed => {
                self.error_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;

                if self.success_count >= config.success_threshold {
                    self.transition(CircuitState::Closed, now);
                    info!(
                        successes = config.success_threshold,
                        "Circuit breaker closed after successful probes"
                    );
                }
            }
            CircuitState::Open => {
                // Late result from a call admitted before the circuit opened
            }
        }
    }

    fn record_failure(&mut self, now: Instant, config: &BreakerConfig) {
        self.refresh(now, config);

        match self.state {
            CircuitState::Closed => {
                // A failure outside the window starts a new run
                if let Some(last) = self.last_error_at {
                    if now.saturating_duration_since(last) > config.timeout {
                        self.error_count = 0;
                    }
                }
                self.error_count += 1;
                self.last_error_at = Some(now);

                if self.error_count >= config.error_threshold {
                    let errors = self.error_count;
                    self.transition(CircuitState::Open, now);
                    warn!(
                        errors,
                        cooldown_ms = config.timeout.as_millis() as u64,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count;
                self.transition(CircuitState::Open, now);
                warn!(successes, "Probe failed, circuit breaker re-opened");
            }
            CircuitState::Open => {}
        }
    }
}

/// Circuit breaker for guarding calls to an unreliable operation
///
/// Cloning a `Breaker` yields another handle to the same circuit.
///
/// # Example
/// ```no_run
/// use breakwater::{Breaker, BreakerError};
/// use std::time::Duration;
///
/// let breaker = Breaker::new(3, 1, Duration::from_secs(5));
///
/// let result = breaker.run(|| {
///     // communicate with some external service and
///     // return an error if the communication failed
///     Ok::<_, std::io::Error>(())
/// });
///
/// match result {
///     Ok(()) => {}                     // success!
///     Err(BreakerError::Open) => {}    // not run, the breaker was open
///     Err(BreakerError::Inner(_)) => {} // some other error
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Breaker {
    config: Arc<BreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl Breaker {
    /// Create a new circuit breaker
    ///
    /// # Arguments
    /// * `error_threshold` - Consecutive failures needed to open the circuit
    /// * `success_threshold` - Consecutive half-open successes needed to close it
    /// * `timeout` - Failure expiry window and open-state cool-down
    ///
    /// Values are not validated; see [`Breaker::try_new`].
    pub fn new(error_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        Self::with_config(BreakerConfig::new(
            error_threshold,
            success_threshold,
            timeout,
        ))
    }

    /// Create a new circuit breaker with the given configuration
    pub fn with_config(config: BreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState::new(Instant::now()))),
        }
    }

    /// Create a new circuit breaker, rejecting zero thresholds or timeout
    pub fn try_new(config: BreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// Get the breaker configuration
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Get the current state of the circuit breaker
    ///
    /// Reading the state may itself move an expired Open circuit to HalfOpen.
    pub fn get_state(&self) -> CircuitState {
        let mut state = self.state.lock();
        state.refresh(Instant::now(), &self.config);
        state.state
    }

    /// Get current consecutive failure count
    pub fn get_error_count(&self) -> u32 {
        let mut state = self.state.lock();
        state.refresh(Instant::now(), &self.config);
        state.error_count
    }

    /// Get current half-open success count
    pub fn get_success_count(&self) -> u32 {
        let mut state = self.state.lock();
        state.refresh(Instant::now(), &self.config);
        state.success_count
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CircuitBreakerState::new(Instant::now());
        debug!("Circuit breaker reset");
    }

    /// Run an operation with circuit breaker protection, blocking until it returns
    ///
    /// Returns [`BreakerError::Open`] without invoking `op` if the circuit
    /// is open. A panic in `op` is counted as a failure and then resumed.
    pub fn run<F, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.check_and_update_state() {
            return Err(BreakerError::Open);
        }

        match panic::catch_unwind(AssertUnwindSafe(op)) {
            Ok(Ok(result)) => {
                self.on_success();
                Ok(result)
            }
            Ok(Err(e)) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
            Err(payload) => {
                self.on_failure();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Run an operation on its own thread without waiting for it
    ///
    /// Returns [`BreakerError::Open`] if the circuit is open, `Ok(())`
    /// otherwise. The outcome is recorded against the circuit when the
    /// thread finishes; the result itself is dropped, and so is any panic.
    pub fn go<F, T, E>(&self, op: F) -> Result<(), BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: 'static,
        E: 'static,
    {
        if !self.check_and_update_state() {
            return Err(BreakerError::Open);
        }

        let breaker = self.clone();
        thread::spawn(move || match panic::catch_unwind(AssertUnwindSafe(op)) {
            Ok(Ok(_)) => breaker.on_success(),
            Ok(Err(_)) => breaker.on_failure(),
            Err(payload) => {
                breaker.on_failure();
                warn!(
                    panic = panic_message(payload.as_ref()),
                    "Guarded operation panicked in background thread"
                );
            }
        });

        Ok(())
    }

    /// Execute an async operation with circuit breaker protection
    ///
    /// Async counterpart of [`Breaker::run`]: panics raised while polling
    /// the operation are counted and resumed.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.check_and_update_state() {
            return Err(BreakerError::Open);
        }

        match AssertUnwindSafe(async move { op().await })
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => {
                self.on_success();
                Ok(result)
            }
            Ok(Err(e)) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
            Err(payload) => {
                self.on_failure();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Spawn an async operation onto the current tokio runtime without waiting for it
    ///
    /// Async counterpart of [`Breaker::go`]. The returned handle resolves
    /// once the outcome has been recorded; it can be awaited or dropped.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<F, Fut, T, E>(&self, op: F) -> Result<JoinHandle<()>, BreakerError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if !self.check_and_update_state() {
            return Err(BreakerError::Open);
        }

        let breaker = self.clone();
        Ok(tokio::spawn(async move {
            match AssertUnwindSafe(async move { op().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(_)) => breaker.on_success(),
                Ok(Err(_)) => breaker.on_failure(),
                Err(payload) => {
                    breaker.on_failure();
                    warn!(
                        panic = panic_message(payload.as_ref()),
                        "Guarded operation panicked in spawned task"
                    );
                }
            }
        }))
    }

    /// Check circuit state; returns `false` if the call must be rejected
    fn check_and_update_state(&self) -> bool {
        let mut state = self.state.lock();
        state.refresh(Instant::now(), &self.config);

        if state.state == CircuitState::Open {
            debug!("Circuit breaker open, rejecting call");
            return false;
        }
        true
    }

    /// Handle successful operation
    fn on_success(&self) {
        self.state.lock().record_success(Instant::now(), &self.config);
    }

    /// Handle failed or panicked operation
    fn on_failure(&self) {
        self.state.lock().record_failure(Instant::now(), &self.config);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
