use axum::Json;
use crate::models::MessageResponse;

// Only reached once the rate limiter has let the request through
pub async fn limited_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("This is a rate-limited sensitive endpoint"))
}
