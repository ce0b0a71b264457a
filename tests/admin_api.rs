//! Admin surface: health report, circuit control, instance management.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;

mod common;

fn request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_health_reports_tracked_instances() {
    let ok = common::start_mock_backend(200, "ok").await;
    let bad = common::start_mock_backend(500, "err").await;
    let config = common::test_config(vec![
        common::instance("order-bad", "order-gateway", &bad.url(), None, 10),
        common::instance("order-ok", "order-gateway", &ok.url(), None, 0),
    ]);
    let (router, _) = common::build_gateway(&config).await;

    let response = common::send(&router, request(Method::GET, "/api/orders", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = common::send(&router, request(Method::GET, "/api/admin/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    let bad_entry = entries.iter().find(|e| e["instanceId"] == "order-bad").unwrap();
    assert_eq!(bad_entry["errorRate"], 100.0);
    assert_eq!(bad_entry["healthScore"], 0);
    assert_eq!(bad_entry["circuitState"], "closed");
    assert_eq!(bad_entry["requestCount"], 1);

    let ok_entry = entries.iter().find(|e| e["instanceId"] == "order-ok").unwrap();
    assert_eq!(ok_entry["healthScore"], 100);
    assert!(ok_entry["avgResponseTimeMs"].is_number());
    assert!(ok_entry["lastUpdated"].is_string());
}

#[tokio::test]
async fn test_reset_circuit_is_idempotent() {
    let config = common::test_config(Vec::new());
    let (router, gateway) = common::build_gateway(&config).await;

    for _ in 0..2 {
        let response = common::send(&router, request(Method::POST, "/api/admin/reset-circuit/order-1", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = common::body_json(response).await;
        assert_eq!(body["message"], "Circuit breaker reset for order-1");

        let record = gateway.breaker().snapshot("order-1").await.unwrap();
        assert_eq!(record.failure_count, 0);
        assert_eq!(record.state.as_str(), "closed");
    }
}

#[tokio::test]
async fn test_reset_closes_open_circuit() {
    let config = common::test_config(Vec::new());
    let (router, gateway) = common::build_gateway(&config).await;
    for _ in 0..5 {
        gateway.breaker().record_failure("pay-1").await;
    }

    let response = common::send(&router, request(Method::GET, "/api/admin/circuits/pay-1", None)).await;
    let body = common::body_json(response).await;
    assert_eq!(body["state"], "open");
    assert_eq!(body["record"]["failure_count"], 5);

    common::send(&router, request(Method::POST, "/api/admin/reset-circuit/pay-1", None)).await;
    assert!(gateway.breaker().can_call("pay-1").await);
}

#[tokio::test]
async fn test_configure_circuit_merges_overrides() {
    let config = common::test_config(Vec::new());
    let (router, _) = common::build_gateway(&config).await;

    let response = common::send(
        &router,
        request(
            Method::PUT,
            "/api/admin/circuits/user-1",
            Some(json!({ "failure_threshold": 2 })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["policy"]["failure_threshold"], 2);
    assert_eq!(body["policy"]["reset_timeout_ms"], 30000);

    let response = common::send(
        &router,
        request(
            Method::PUT,
            "/api/admin/circuits/user-1",
            Some(json!({ "failure_threshold": 0 })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_instance_lifecycle() {
    let backend = common::start_mock_backend(200, "registered").await;
    let config = common::test_config(Vec::new());
    let (router, _) = common::build_gateway(&config).await;

    let new_instance = json!({
        "name": "product-1",
        "serviceType": "product-gateway",
        "baseUrl": backend.url(),
        "credential": "product-key",
        "region": "eu-west",
        "priority": 3
    });
    let response = common::send(&router, request(Method::POST, "/api/admin/instances", Some(new_instance.clone()))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_json(response).await;
    assert_eq!(body["name"], "product-1");
    assert!(body.get("credential").is_none());

    let response = common::send(&router, request(Method::POST, "/api/admin/instances", Some(new_instance))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(common::body_json(response).await["error"], "conflict");

    let response = common::send(&router, request(Method::GET, "/api/products", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_string(response).await, "registered");

    let response = common::send(
        &router,
        request(Method::GET, "/api/admin/instances?service_type=product-gateway", None),
    )
    .await;
    assert_eq!(common::body_json(response).await.as_array().unwrap().len(), 1);

    let response = common::send(
        &router,
        request(Method::PATCH, "/api/admin/instances/product-1", Some(json!({ "priority": 9 }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await["priority"], 9);

    let response = common::send(
        &router,
        request(Method::PATCH, "/api/admin/instances/missing", Some(json!({ "priority": 1 }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = common::send(&router, request(Method::DELETE, "/api/admin/instances/product-1", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await["isActive"], false);

    let response = common::send(&router, request(Method::GET, "/api/products", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_admin_key_enforced_when_configured() {
    let mut config = common::test_config(Vec::new());
    config.admin.api_key = Some("admin-secret".to_string());
    let (router, _) = common::build_gateway(&config).await;

    let response = common::send(&router, request(Method::GET, "/api/admin/health", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let authorized = Request::builder()
        .uri("/api/admin/health")
        .header(header::AUTHORIZATION, "Bearer admin-secret")
        .body(Body::empty())
        .unwrap();
    let response = common::send(&router, authorized).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_propagated() {
    let config = common::test_config(Vec::new());
    let (router, _) = common::build_gateway(&config).await;

    let response = common::send(&router, request(Method::GET, "/api/admin/health", None)).await;
    assert!(response.headers().contains_key("x-request-id"));
}
