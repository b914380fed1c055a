use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, register_counter, register_gauge};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMIT_ALLOWED: Counter =
        register_counter!(
            "gateway_rate_limit_allowed_total",
            "Requests let through by the limiter"
        )
        .unwrap();
    pub static ref RATE_LIMIT_REJECTED: Counter =
        register_counter!(
            "gateway_rate_limit_rejected_total",
            "Requests rejected by the limiter"
        )
        .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!(
            "gateway_rate_limit_tracked_clients",
            "Clients with a live rate-limit window"
        )
        .unwrap();
}

// Register everything up front so `/metrics` lists all series from the start
pub fn register() {
    lazy_static::initialize(&REQUEST_TOTAL);
    lazy_static::initialize(&RATE_LIMIT_ALLOWED);
    lazy_static::initialize(&RATE_LIMIT_REJECTED);
    lazy_static::initialize(&TRACKED_CLIENTS);
}
