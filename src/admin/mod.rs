pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/health", get(get_health))
        .route("/api/admin/reset-circuit/{instance_id}", post(reset_circuit))
        .route(
            "/api/admin/circuits/{instance_id}",
            get(get_circuit).put(configure_circuit),
        )
        .route("/api/admin/instances", get(list_instances).post(register_instance))
        .route(
            "/api/admin/instances/{name}",
            patch(update_instance).delete(deactivate_instance),
        )
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
