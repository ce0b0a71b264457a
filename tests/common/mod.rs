//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use smart_gateway::config::{GatewayConfig, InstanceConfig};
use smart_gateway::gateway::SmartGateway;
use smart_gateway::http::{AppState, GatewayServer};
use smart_gateway::lifecycle::{assemble, Collaborators};

/// A running mock backend.
#[allow(dead_code)]
pub struct MockBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicU32>,
    /// Raw head of the most recent request.
    pub last_request: Arc<Mutex<String>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hit_count(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock backend that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_backend(status: u16, body: &'static str) -> MockBackend {
    start_programmable_backend(move || async move { (status, body.to_string()) }).await
}

/// Start a backend that accepts connections but never answers in time.
#[allow(dead_code)]
pub async fn start_hanging_backend() -> MockBackend {
    start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        (200, "too late".to_string())
    })
    .await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let last_request = Arc::new(Mutex::new(String::new()));
    let f = Arc::new(f);

    {
        let hits = hits.clone();
        let last_request = last_request.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let f = f.clone();
                        let hits = hits.clone();
                        let last_request = last_request.clone();
                        tokio::spawn(async move {
                            let mut buf = vec![0u8; 8192];
                            let n = socket.read(&mut buf).await.unwrap_or(0);
                            *last_request.lock() = String::from_utf8_lossy(&buf[..n]).to_string();
                            hits.fetch_add(1, Ordering::SeqCst);

                            let (status, body) = f().await;
                            let status_text = match status {
                                200 => "200 OK",
                                404 => "404 Not Found",
                                429 => "429 Too Many Requests",
                                500 => "500 Internal Server Error",
                                502 => "502 Bad Gateway",
                                503 => "503 Service Unavailable",
                                _ => "200 OK",
                            };

                            let response_str = format!(
                                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                status_text,
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response_str.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });
    }

    MockBackend {
        addr,
        hits,
        last_request,
    }
}

/// Seed-instance config pointing at `url`.
#[allow(dead_code)]
pub fn instance(name: &str, service_type: &str, url: &str, region: Option<&str>, priority: i32) -> InstanceConfig {
    InstanceConfig {
        name: name.to_string(),
        service_type: service_type.to_string(),
        base_url: url.to_string(),
        credential: format!("{}-secret", name),
        region: region.map(str::to_string),
        priority,
        active: true,
        metadata: Default::default(),
    }
}

/// Config with short timeouts suitable for tests.
#[allow(dead_code)]
pub fn test_config(instances: Vec<InstanceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.timeouts.forward_ms = 300;
    config.instances = instances;
    config
}

/// Assemble a gateway over the in-memory cache and registry store.
pub async fn build_gateway(config: &GatewayConfig) -> (Router, Arc<SmartGateway>) {
    let parts = Collaborators::from_config(config).await.unwrap();
    let assembly = assemble(config, parts).await.unwrap();
    let state = AppState::new(assembly.gateway.clone(), config);
    (GatewayServer::new(state, config).router(), assembly.gateway)
}

/// Send one request through the router in-process.
#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
