use axum::Json;
use serde::Serialize;

pub const SERVICE_NAME: &str = "portfolio-api";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
}

// health handler - no upstream call, no rate limit
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}
