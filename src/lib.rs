//! Limit gateway - a small HTTP service with one endpoint guarded by a
//! per-client fixed-window rate limiter.
//!
//! The limiter is usable on its own: build a [`rate_limit::RateLimiter`]
//! and wrap any tower service with [`rate_limit::RateLimitLayer`].

pub mod client_key;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod server;
pub mod state;
pub mod store;
pub mod sweeper;
