use serde::{Deserialize, Serialize};

// `GET /` and `GET /limit` body
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// `GET /health` body
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String, // ISO-8601, UTC, millisecond precision
}

// `GET /ip` body - resolved client plus the raw inputs it came from
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IpResponse {
    pub ip: String,
    pub x_forwarded_for: String, // empty when the header is absent
    pub real_ip: String,         // transport peer
}

// Body for errors raised outside the limiter
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
