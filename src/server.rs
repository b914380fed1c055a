use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::error::Result;
use crate::handlers::{
    health_handler, index_handler, ip_handler, limited_handler, metrics_handler,
    not_found_handler,
};
use crate::metrics::REQUEST_TOTAL;
use crate::rate_limit::RateLimitLayer;
use crate::state::AppState;

// app router - only `/limit` sits behind the limiter
pub fn build_router(state: Arc<AppState>) -> Router {
    let limit_layer = RateLimitLayer::new(Arc::clone(&state.limiter));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ip", get(ip_handler))
        .route("/limit", get(limited_handler).layer(limit_layer))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn(count_requests))
        .with_state(state)
}

async fn count_requests(req: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();
    next.run(req).await
}

// Serve until `shutdown` resolves; each connection's peer address is kept
// for the client key resolver
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_key::{ClientKeyResolver, TrustProxy};
    use crate::rate_limit::{RateLimitConfig, RateLimiter};
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(trust: TrustProxy) -> Router {
        let config = RateLimitConfig::new(30_000, 3).unwrap();
        let limiter = Arc::new(RateLimiter::new(config, ClientKeyResolver::new(trust)));
        build_router(Arc::new(AppState::new(limiter)))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40_000))))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let response = app(TrustProxy::Disabled).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Rate limit gateway is running!");
    }

    #[tokio::test]
    async fn test_health_timestamp_is_current() {
        let response = app(TrustProxy::Disabled)
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "OK");
        let raw = body["timestamp"].as_str().unwrap();
        let timestamp = chrono::DateTime::parse_from_rfc3339(raw)
            .unwrap()
            .with_timezone(&chrono::Utc);
        let skew = chrono::Utc::now() - timestamp;
        assert!(skew.num_milliseconds().abs() < 1_000);
    }

    #[tokio::test]
    async fn test_ip_without_forwarded_header() {
        let response = app(TrustProxy::Disabled).oneshot(get_request("/ip")).await.unwrap();
        let body = json_body(response).await;

        assert_eq!(body["ip"], "127.0.0.1");
        assert_eq!(body["realIp"], "127.0.0.1");
        assert_eq!(body["xForwardedFor"], "");
    }

    #[tokio::test]
    async fn test_ip_behind_trusted_proxy() {
        let request = Request::builder()
            .uri("/ip")
            .header("x-forwarded-for", "198.51.100.4, 203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let body = json_body(app(TrustProxy::Hops(1)).oneshot(request).await.unwrap()).await;

        assert_eq!(body["ip"], "203.0.113.9");
        assert_eq!(body["realIp"], "127.0.0.1");
        assert_eq!(body["xForwardedFor"], "198.51.100.4, 203.0.113.9");
    }

    #[tokio::test]
    async fn test_limit_route_rejects_fourth_request() {
        let app = app(TrustProxy::Disabled);

        for remaining in ["2", "1", "0"] {
            let response = app.clone().oneshot(get_request("/limit")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["ratelimit-remaining"], remaining);
            assert_eq!(
                json_body(response).await["message"],
                "This is a rate-limited sensitive endpoint"
            );
        }

        let response = app.clone().oneshot(get_request("/limit")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(response).await["retryAfter"], "30 seconds");

        // a different peer has its own quota
        let mut request = get_request("/limit");
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 2], 40_001))));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["ratelimit-remaining"], "2");

        // other routes are never limited
        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app(TrustProxy::Disabled)
            .oneshot(get_request("/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Not Found");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::metrics::register();
        let response = app(TrustProxy::Disabled)
            .oneshot(get_request("/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("gateway_rate_limit_rejected_total"));
    }
}
