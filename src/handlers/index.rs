use axum::{Json, http::StatusCode};
use crate::models::{ErrorResponse, MessageResponse};

// service banner
pub async fn index_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("Rate limit gateway is running!"))
}

pub async fn not_found_handler() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not Found".to_string(),
        }),
    )
}
