use std::sync::Arc;
use crate::client_key::ClientKeyResolver;
use crate::rate_limit::RateLimiter;
// app's shared state

pub struct AppState {
    pub resolver: ClientKeyResolver, // same policy the limiter keys on
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            resolver: *limiter.resolver(),
            limiter,
        }
    }
}
