//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → /api/admin/* → admin handlers
//!     → /api/*       → strip prefix → SmartGateway::route
//!     → GatewayResponse | structured GatewayError
//!     → Send to client
//! ```

pub mod server;

pub use server::{build_router, AppState, GatewayServer, API_PREFIX};
