use axum::{Json, extract::{Request, State}};
use std::sync::Arc;
use tracing::info;
use crate::client_key::{X_FORWARDED_FOR, peer_ip};
use crate::models::IpResponse;
use crate::state::AppState;

// Shows how the client address was derived: resolved, forwarded and peer
pub async fn ip_handler(State(state): State<Arc<AppState>>, req: Request) -> Json<IpResponse> {
    let peer = peer_ip(&req);
    let resolved = state.resolver.resolve(peer, req.headers());

    let x_forwarded_for = req
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let real_ip = peer.map(|ip| ip.to_string()).unwrap_or_default();
    let ip = resolved.map(|ip| ip.to_string()).unwrap_or_default();

    info!(
        ip = %ip,
        x_forwarded_for = %x_forwarded_for,
        real_ip = %real_ip,
        "IP address requested"
    );

    Json(IpResponse {
        ip,
        x_forwarded_for,
        real_ip,
    })
}
