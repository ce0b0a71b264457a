//! Caller-facing errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::registry::RegistryError;

/// Error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ServiceUnavailable,
    NotFound,
    Conflict,
    BadRequest,
    RequestTimeout,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no instances available for {service_type}")]
    NoInstances { service_type: String },

    #[error("all instances unavailable for {service_type} ({attempted} attempted, {skipped} circuit-open)")]
    AllInstancesUnavailable {
        service_type: String,
        attempted: usize,
        skipped: usize,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("request not received within {}ms", .0.as_millis())]
    RequestTimeout(std::time::Duration),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NoInstances { .. } | GatewayError::AllInstancesUnavailable { .. } => {
                ErrorKind::ServiceUnavailable
            }
            GatewayError::Registry(RegistryError::NotFound(_)) => ErrorKind::NotFound,
            GatewayError::Registry(RegistryError::Duplicate(_)) => ErrorKind::Conflict,
            GatewayError::Registry(RegistryError::InvalidUrl { .. }) => ErrorKind::BadRequest,
            GatewayError::Registry(_) => ErrorKind::Internal,
            GatewayError::BadRequest(_) => ErrorKind::BadRequest,
            GatewayError::RequestTimeout(_) => ErrorKind::RequestTimeout,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    error: ErrorKind,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            // Store and cipher details stay in the logs.
            ErrorKind::Internal => {
                tracing::error!(error = %self, "Internal gateway error");
                "internal gateway error".to_string()
            }
            _ => self.to_string(),
        };
        (kind.status(), Json(ErrorBody { message, error: kind })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let exhausted = GatewayError::AllInstancesUnavailable {
            service_type: "order-gateway".to_string(),
            attempted: 2,
            skipped: 0,
        };
        assert_eq!(exhausted.kind().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            GatewayError::from(RegistryError::NotFound("x".to_string())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            GatewayError::from(RegistryError::Duplicate("x".to_string())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            GatewayError::from(RegistryError::Store("db down".to_string())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            GatewayError::RequestTimeout(std::time::Duration::from_secs(1)).kind().status(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn test_internal_message_hidden() {
        let response = GatewayError::from(RegistryError::Store("db password wrong".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
