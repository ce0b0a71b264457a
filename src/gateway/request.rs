//! Request and response as seen by the orchestrator.
//!
//! # Design Decisions
//! - Bodies are buffered so a request can be replayed against the next
//!   candidate after a failure
//! - Hop-by-hop headers are stripped on the way back

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::security::headers::sanitize_response_headers;

/// Header naming the instance that produced a response.
pub const X_GATEWAY_INSTANCE: &str = "x-gateway-instance";

/// Inbound request with the gateway path prefix removed.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    /// Backend-relative path, always starting with `/`.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            method,
            path,
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Backend response plus the instance that served it.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub instance: String,
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = sanitize_response_headers(&self.headers);
        if let Ok(value) = HeaderValue::from_str(&self.instance) {
            response.headers_mut().insert(X_GATEWAY_INSTANCE, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_normalized() {
        let request = GatewayRequest::new(Method::GET, "orders/1").with_query(Some(String::new()));
        assert_eq!(request.path, "/orders/1");
        assert!(request.query.is_none());
    }

    #[test]
    fn test_response_names_instance() {
        let response = GatewayResponse {
            status: StatusCode::CREATED,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"ok"),
            instance: "order-1".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get(X_GATEWAY_INSTANCE).unwrap(), "order-1");
    }
}
