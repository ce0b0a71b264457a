//! Security subsystem.
//!
//! # Components
//! - credentials.rs: encryption of instance credentials at rest
//! - headers.rs: header hygiene on forwarded requests
//!
//! # Design Decisions
//! - Credentials are decrypted only at the point of use
//! - Inbound authorization never reaches a backend

pub mod credentials;
pub mod headers;

pub use credentials::{AesCbcCipher, CredentialCipher, CredentialError};
