use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::gateway::{GatewayError, HealthStatusEntry};
use crate::http::server::AppState;
use crate::registry::{InstanceQuery, InstanceUpdate, NewInstance, ServiceInstance};
use crate::resilience::{CircuitOverrides, CircuitRecord, CircuitState};

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStatus {
    pub instance_id: String,
    pub state: CircuitState,
    /// `None` until the instance has been observed.
    pub record: Option<CircuitRecord>,
}

pub async fn get_health(State(state): State<AppState>) -> Json<Vec<HealthStatusEntry>> {
    Json(state.gateway.health_status().await)
}

pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Json<MessageResponse> {
    state.gateway.reset_circuit(&instance_id).await;
    Json(MessageResponse {
        message: format!("Circuit breaker reset for {}", instance_id),
    })
}

pub async fn get_circuit(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Json<CircuitStatus> {
    let breaker = state.gateway.breaker();
    Json(CircuitStatus {
        state: breaker.circuit_state(&instance_id).await,
        record: breaker.snapshot(&instance_id).await,
        instance_id,
    })
}

pub async fn configure_circuit(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Json(overrides): Json<CircuitOverrides>,
) -> Result<Json<CircuitRecord>, GatewayError> {
    if overrides.failure_threshold == Some(0)
        || overrides.reset_timeout_ms == Some(0)
        || overrides.failure_window_ms == Some(0)
    {
        return Err(GatewayError::BadRequest("circuit overrides must be positive".to_string()));
    }
    Ok(Json(state.gateway.configure_circuit(&instance_id, &overrides).await))
}

pub async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
) -> Result<Json<Vec<ServiceInstance>>, GatewayError> {
    Ok(Json(state.gateway.registry().list(&query).await?))
}

pub async fn register_instance(
    State(state): State<AppState>,
    Json(new): Json<NewInstance>,
) -> Result<(StatusCode, Json<ServiceInstance>), GatewayError> {
    if new.name.trim().is_empty() || new.service_type.trim().is_empty() {
        return Err(GatewayError::BadRequest("name and serviceType are required".to_string()));
    }
    let instance = state.gateway.registry().register_instance(new).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

pub async fn update_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<InstanceUpdate>,
) -> Result<Json<ServiceInstance>, GatewayError> {
    Ok(Json(state.gateway.registry().update_instance(&name, update).await?))
}

pub async fn deactivate_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceInstance>, GatewayError> {
    Ok(Json(state.gateway.registry().deactivate_instance(&name).await?))
}
