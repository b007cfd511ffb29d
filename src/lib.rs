//! Breakwater: Pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! This crate provides two building blocks for guarding calls to unreliable
//! operations, typically remote services:
//!
//! - **Circuit Breaker**: Stops calling a failing operation until it appears to have recovered
//! - **Deadline**: Bounds how long a caller waits and asks the operation to stop cooperatively
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - The operation being guarded (it may fail, panic, or ignore cancellation)
//! - Network protocols or storage systems
//! - Where configuration comes from
//!
//! The two primitives share no state. Wrap an operation with both if you
//! need both; the crate does not compose them for you. Nothing is retried
//! automatically.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (Counts failures, opens on threshold)  │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Deadline                          │  ← Bounded waiting
//! │  (Races work against a timer)           │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!         External Service
//! ```
//!
//! # Usage Example
//!
//! ## Basic Circuit Breaker
//!
//! ```no_run
//! use breakwater::{Breaker, BreakerError, CircuitState};
//! use std::time::Duration;
//!
//! // Open after 3 failures, close after 1 successful probe, 5s window
//! let breaker = Breaker::new(3, 1, Duration::from_secs(5));
//!
//! match breaker.run(|| Ok::<_, std::io::Error>(42)) {
//!     Ok(value) => println!("got {}", value),
//!     Err(BreakerError::Open) => println!("not attempted, breaker is open"),
//!     Err(BreakerError::Inner(e)) => println!("operation failed: {}", e),
//! }
//!
//! assert_eq!(breaker.get_state(), CircuitState::Closed);
//! ```
//!
//! ## Async Circuit Breaker
//!
//! ```no_run
//! use breakwater::{Breaker, BreakerError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), BreakerError<std::io::Error>> {
//! let breaker = Breaker::new(3, 1, Duration::from_secs(5));
//!
//! let result = breaker.call(|| async {
//!     // Your potentially failing operation
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Deadline
//!
//! ```no_run
//! use breakwater::{Deadline, DeadlineError};
//! use std::time::Duration;
//!
//! let deadline = Deadline::new(Duration::from_millis(250));
//!
//! let result = deadline.run(|stop| {
//!     for _ in 0..100 {
//!         if stop.is_stopped() {
//!             break;
//!         }
//!         // do a slice of work
//!     }
//!     Ok::<_, std::io::Error>(())
//! });
//!
//! if let Err(DeadlineError::TimedOut) = result {
//!     println!("gave up waiting");
//! }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod deadline;
pub mod error;

// Re-export main types for convenience
pub use circuit_breaker::{Breaker, CircuitState};
pub use config::BreakerConfig;
pub use deadline::{Deadline, StopSignal};
pub use error::{BreakerError, ConfigError, DeadlineError};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use breakwater::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{Breaker, CircuitState};
    pub use super::config::BreakerConfig;
    pub use super::deadline::{Deadline, StopSignal};
    pub use super::error::{BreakerError, ConfigError, DeadlineError};
}
