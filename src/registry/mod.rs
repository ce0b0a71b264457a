//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Category → service type
//!     → service_registry.rs (active, region filter, priority order)
//!     → store.rs (source of truth)
//!     → Return: ordered candidates
//!
//! Mutations (register / update / deactivate)
//!     → credential encrypted before storage
//!     → store.rs
//!     → directory cache refreshed
//! ```
//!
//! # Design Decisions
//! - Equal priorities keep store insertion order
//! - The cache is an accelerator, never authoritative
//! - Circuit state is per instance; there is no type-wide circuit

pub mod error;
pub mod instance;
pub mod service_registry;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use instance::{InstanceQuery, InstanceUpdate, NewInstance, ServiceInstance};
pub use service_registry::{ServiceRegistry, DIRECTORY_KEY};
pub use store::{InMemoryRegistryStore, RegistryStore};
