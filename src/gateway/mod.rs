//! Smart gateway orchestration.
//!
//! # Data Flow
//! ```text
//! GatewayRequest
//!     → orchestrator.rs (classify, rank, circuit gate, failover)
//!     → forwarder.rs (credential injection, outbound call)
//!     → GatewayResponse | GatewayError
//! ```

pub mod error;
pub mod forwarder;
pub mod orchestrator;
pub mod request;

pub use error::{ErrorKind, GatewayError};
pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
pub use orchestrator::{HealthStatusEntry, RoutingDecision, SmartGateway};
pub use request::{GatewayRequest, GatewayResponse, X_GATEWAY_INSTANCE};
