use axum::Json;
use worklink_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("worklink-messaging", env!("CARGO_PKG_VERSION")))
}
