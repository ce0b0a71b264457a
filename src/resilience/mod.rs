//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an instance:
//!     → circuit_breaker.rs (may this instance be called at all?)
//!     → timeouts.rs (enforce forward/classifier deadline)
//!     → circuit_breaker.rs (record outcome, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retry against the same instance; recovery is failover to the next one
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{
    CircuitBreaker, CircuitOverrides, CircuitPolicy, CircuitRecord, CircuitState,
};
pub use timeouts::{with_deadline, Elapsed};
