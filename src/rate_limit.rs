//! Fixed-window rate limiting.
//!
//! Time is cut into windows of `window_ms` starting at each client's first
//! request. Every request in a window shares one counter, and the counter
//! drops back to zero once the window is over. Traffic straddling a boundary
//! can therefore see up to twice the limit in a short span; that is inherent
//! to fixed windows.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tower::{Layer, Service};
use tracing::{debug, trace};

use crate::client_key::{ClientKey, ClientKeyResolver};
use crate::clock::{Clock, SystemClock};
use crate::error::{GatewayError, Result};
use crate::metrics::{RATE_LIMIT_ALLOWED, RATE_LIMIT_REJECTED};
use crate::store::{MemoryStore, WindowStore};

pub const DEFAULT_WINDOW_MS: u64 = 30_000;
pub const DEFAULT_MAX_REQUESTS: u32 = 3;

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Which rate-limit headers to put on responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HeaderStyle {
    /// `RateLimit-Policy`, `RateLimit-Limit`, `RateLimit-Remaining` and
    /// `RateLimit-Reset` (seconds until reset).
    #[default]
    Standard,
    /// `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
    /// (epoch seconds).
    Legacy,
    /// No rate-limit headers at all.
    #[value(name = "none")]
    Disabled,
}

/// Limiter settings. Immutable once built.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    window_ms: u64,
    max_requests: u32,
    message: Value,
    status: StatusCode,
    header_style: HeaderStyle,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_requests: DEFAULT_MAX_REQUESTS,
            message: default_message(DEFAULT_WINDOW_MS),
            status: StatusCode::TOO_MANY_REQUESTS,
            header_style: HeaderStyle::Standard,
        }
    }
}

impl RateLimitConfig {
    /// Validated config with the default 429 rejection and a message whose
    /// `retryAfter` text matches the window.
    pub fn new(window_ms: u64, max_requests: u32) -> Result<Self> {
        if window_ms == 0 {
            return Err(GatewayError::InvalidWindow);
        }
        if max_requests == 0 {
            return Err(GatewayError::InvalidLimit);
        }
        Ok(Self {
            window_ms,
            max_requests,
            message: default_message(window_ms),
            ..Self::default()
        })
    }

    pub fn with_message(mut self, message: Value) -> Self {
        self.message = message;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header_style(mut self, header_style: HeaderStyle) -> Self {
        self.header_style = header_style;
        self
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn message(&self) -> &Value {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header_style(&self) -> HeaderStyle {
        self.header_style
    }
}

/// Rejection body: `{"error": ..., "retryAfter": ...}`.
pub fn default_message(window_ms: u64) -> Value {
    json!({
        "error": "Too many requests from this IP, please try again later.",
        "retryAfter": humanize_window(window_ms),
    })
}

// 30_000 -> "30 seconds", 120_000 -> "2 minutes", 1_500 -> "1500 milliseconds"
fn humanize_window(window_ms: u64) -> String {
    fn plural(n: u64, unit: &str) -> String {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    }

    if window_ms % 1000 != 0 {
        return plural(window_ms, "millisecond");
    }
    let secs = window_ms / 1000;
    if secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else {
        plural(secs, "second")
    }
}

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests counted in the current window, this one included.
    pub count: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the window ends.
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// Whole seconds (rounded up) from `now_ms` until the window ends.
    pub fn reset_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// The limiter: resolves a client, counts the request, decides.
pub struct RateLimiter {
    config: RateLimitConfig,
    resolver: ClientKeyResolver,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Limiter with an in-memory store and the system clock.
    pub fn new(config: RateLimitConfig, resolver: ClientKeyResolver) -> Self {
        Self::with_parts(config, resolver, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Limiter on an explicit store and clock. Window expiry in the store
    /// always follows `config.window_ms()`.
    pub fn with_parts(
        config: RateLimitConfig,
        resolver: ClientKeyResolver,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            resolver,
            store,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ClientKeyResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn WindowStore> {
        &self.store
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Count a request from `key` at `now_ms` and decide whether it may pass.
    pub fn check(&self, key: &ClientKey, now_ms: u64) -> RateLimitDecision {
        let entry = self.store.increment(key, now_ms, self.config.window_ms);
        let limit = self.config.max_requests;

        let decision = RateLimitDecision {
            allowed: entry.count <= limit,
            limit,
            count: entry.count,
            remaining: limit.saturating_sub(entry.count),
            reset_at_ms: entry.window_start_ms.saturating_add(self.config.window_ms),
        };

        trace!(
            key = %key,
            count = decision.count,
            remaining = decision.remaining,
            "Checked rate limit"
        );
        decision
    }

    /// [`check`](Self::check) at the injected clock's current time.
    pub fn check_now(&self, key: &ClientKey) -> RateLimitDecision {
        self.check(key, self.now_ms())
    }

    pub fn reset_key(&self, key: &ClientKey) {
        self.store.reset_key(key);
    }

    /// Drop counters whose window is over.
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(self.now_ms(), self.config.window_ms)
    }

    /// Write the configured rate-limit headers for `decision`.
    pub fn apply_headers(
        &self,
        headers: &mut HeaderMap,
        decision: &RateLimitDecision,
        now_ms: u64,
    ) {
        let limit = HeaderValue::from(decision.limit);
        let remaining = HeaderValue::from(decision.remaining);

        match self.config.header_style {
            HeaderStyle::Standard => {
                let window_secs = self.config.window_ms.div_ceil(1000);
                let policy = format!("{};w={}", decision.limit, window_secs);
                if let Ok(policy) = HeaderValue::try_from(policy) {
                    headers.insert(RATELIMIT_POLICY, policy);
                }
                let reset = decision.reset_after_secs(now_ms);
                headers.insert(RATELIMIT_LIMIT, limit);
                headers.insert(RATELIMIT_REMAINING, remaining);
                headers.insert(RATELIMIT_RESET, HeaderValue::from(reset));
            }
            HeaderStyle::Legacy => {
                let reset = decision.reset_at_ms.div_ceil(1000);
                headers.insert(X_RATELIMIT_LIMIT, limit);
                headers.insert(X_RATELIMIT_REMAINING, remaining);
                headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
            }
            HeaderStyle::Disabled => {}
        }
    }

    /// Response for a denied request: configured status and message, plus
    /// headers and `Retry-After` unless headers are disabled.
    pub fn rejection(&self, decision: &RateLimitDecision, now_ms: u64) -> Response {
        let body = Json(self.config.message.clone());
        let mut response = (self.config.status, body).into_response();
        if self.config.header_style != HeaderStyle::Disabled {
            let headers = response.headers_mut();
            self.apply_headers(headers, decision, now_ms);
            let retry_after = decision.reset_after_secs(now_ms);
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

/// Wraps a handler so it only runs for requests the limiter allows.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<Request<B>> for RateLimitService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Response, S::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let key = self.limiter.resolver().key_for(&req);
        let now = self.limiter.now_ms();
        let decision = self.limiter.check(&key, now);

        if !decision.allowed {
            RATE_LIMIT_REJECTED.inc();
            debug!(
                key = %key,
                count = decision.count,
                limit = decision.limit,
                "Rate limit exceeded"
            );
            let response = self.limiter.rejection(&decision, now);
            return Box::pin(async move { Ok(response) });
        }

        RATE_LIMIT_ALLOWED.inc();
        req.extensions_mut().insert(decision);

        // Use the instance that was polled ready, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = Arc::clone(&self.limiter);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            limiter.apply_headers(response.headers_mut(), &decision, now);
            Ok(response)
        })
    }
}
