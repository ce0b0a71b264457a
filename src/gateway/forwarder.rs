//! Outbound forwarding to a backend instance.
//!
//! # Responsibilities
//! - Preserve method, path, query and body
//! - Drop inbound authorization; send the instance credential instead
//! - Treat any non-success status as a failed attempt
//!
//! # Design Decisions
//! - The deadline is applied by the caller so every `Forwarder`
//!   implementation gets identical timeout semantics

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use super::request::{GatewayRequest, GatewayResponse};
use crate::registry::ServiceInstance;
use crate::security::headers::{inject_bearer, sanitize_forward_headers};
use crate::security::CredentialError;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("credential unavailable: {0}")]
    Credential(#[from] CredentialError),

    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),
}

impl ForwardError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Transport(_) => "transport",
            ForwardError::Status(_) => "status",
            ForwardError::Credential(_) => "credential",
            ForwardError::InvalidRequest(_) => "invalid_request",
        }
    }
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Send `request` to `instance` authenticated with `credential`.
    async fn forward(
        &self,
        instance: &ServiceInstance,
        credential: &str,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse, ForwardError>;
}

/// `reqwest`-backed forwarder with a pooled client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(connect_timeout: Duration) -> Result<Self, ForwardError> {
        // Backends are addressed directly, never through an environment proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ForwardError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        instance: &ServiceInstance,
        credential: &str,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse, ForwardError> {
        let url = target_url(&instance.base_url, &request.path, request.query.as_deref());

        let mut headers = sanitize_forward_headers(&request.headers);
        inject_bearer(&mut headers, credential)
            .map_err(|_| ForwardError::InvalidRequest("credential is not a valid header value".to_string()))?;

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout(Duration::ZERO)
                } else {
                    ForwardError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        Ok(GatewayResponse {
            status,
            headers,
            body,
            instance: instance.name.clone(),
        })
    }
}

/// Join the backend base URL with a request path and query.
pub fn target_url(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(query);
    url
}
