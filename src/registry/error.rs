use thiserror::Error;

use crate::security::CredentialError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service instance not found: {0}")]
    NotFound(String),

    #[error("service instance already exists: {0}")]
    Duplicate(String),

    #[error("invalid base url for {name}: {reason}")]
    InvalidUrl { name: String, reason: String },

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("registry store error: {0}")]
    Store(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
