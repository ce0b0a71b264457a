//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway and admin handlers
//! - Wire up middleware (tracing, body limit, request ID)
//! - Strip the `/api` prefix and hand requests to the orchestrator
//! - Serve until the shutdown coordinator fires
//!
//! # Design Decisions
//! - Gateway routes are bounded by the orchestrator's request deadline, not
//!   by `TimeoutLayer`, so exhaustion always ends in a recorded 503
//! - Admin routes keep the plain `TimeoutLayer`

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::gateway::{GatewayError, GatewayRequest, SmartGateway};
use crate::lifecycle::Shutdown;
use crate::resilience::with_deadline;

/// Prefix under which every gateway route lives.
pub const API_PREFIX: &str = "/api";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SmartGateway>,
    /// Bearer token for admin routes; `None` leaves them open.
    pub admin_api_key: Option<Arc<str>>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(gateway: Arc<SmartGateway>, config: &GatewayConfig) -> Self {
        Self {
            gateway,
            admin_api_key: config.admin.api_key.as_deref().map(Arc::from),
            max_body_bytes: config.listener.max_body_bytes,
        }
    }
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState, config: &GatewayConfig) -> Self {
        Self {
            router: build_router(state, config),
        }
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, config: &GatewayConfig) -> Router {
    let admin = admin::admin_router(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

    Router::new()
        .merge(admin)
        .route(API_PREFIX, any(proxy_handler))
        .route("/api/{*path}", any(proxy_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes)),
        )
}

/// Route one inbound request through the smart gateway.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // One deadline covers reading the body and the whole failover pass.
    let deadline = state.gateway.deadline_from_now();
    let read = axum::body::to_bytes(body, state.max_body_bytes);
    let read = match deadline {
        Some(deadline) => with_deadline(deadline.saturating_duration_since(Instant::now()), read).await,
        None => Ok(read.await),
    };
    let body = match read {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return GatewayError::BadRequest("request body unreadable or too large".to_string()).into_response();
        }
        Err(elapsed) => {
            tracing::warn!(request_id = %request_id, error = %elapsed, "Request body not received in time");
            return GatewayError::RequestTimeout(elapsed.0).into_response();
        }
    };

    let path = backend_path(parts.uri.path());
    tracing::debug!(request_id = %request_id, method = %parts.method, path = %path, "Routing request");

    let request = GatewayRequest::new(parts.method, path)
        .with_query(parts.uri.query().map(str::to_string))
        .with_headers(parts.headers)
        .with_body(body);

    match state.gateway.route_until(request, deadline).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Request failed");
            e.into_response()
        }
    }
}

/// `/api/orders/1` → `/orders/1`, `/api` → `/`.
fn backend_path(path: &str) -> String {
    let stripped = path.strip_prefix(API_PREFIX).unwrap_or(path);
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_path() {
        assert_eq!(backend_path("/api/orders/1"), "/orders/1");
        assert_eq!(backend_path("/api"), "/");
        assert_eq!(backend_path("/api/"), "/");
    }
}
