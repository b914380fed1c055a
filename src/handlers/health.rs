use axum::Json;
use chrono::SecondsFormat;
use crate::models::HealthResponse;

// health handler
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
