//! Liveness probe.

use axum::Json;

use crate::api::models::HealthResponse;

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check",
    description = "Always answers `{\"status\": \"ok\"}` while the process is serving requests. Does not contact the provider.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string() })
}
