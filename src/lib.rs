//! Smart API gateway: classification-driven routing with health-ranked
//! failover and per-instance circuit breakers.

pub mod admin;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use gateway::SmartGateway;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
