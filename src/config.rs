use clap::Parser;
use std::time::Duration;

use crate::client_key::TrustProxy;
use crate::error::Result;
use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS, HeaderStyle, RateLimitConfig};

// CLI argument structure; every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "limit-gateway")]
#[command(about = "Small HTTP service with a fixed-window rate-limited endpoint")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // Reverse proxies in front of us: "false", "true" or a hop count
    #[arg(long, env = "TRUST_PROXY", default_value_t = TrustProxy::Hops(1))]
    pub trust_proxy: TrustProxy,

    // Rate limit window in milliseconds
    #[arg(long, env = "RATE_WINDOW_MS", default_value_t = DEFAULT_WINDOW_MS)]
    pub rate_window_ms: u64,

    // Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = DEFAULT_MAX_REQUESTS)]
    pub rate_limit: u32,

    // Rate limit header flavour
    #[arg(long, env = "RATE_LIMIT_HEADERS", value_enum, default_value_t = HeaderStyle::Standard)]
    pub headers: HeaderStyle,

    // Expired-window sweep interval in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval: u64,

    // Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Args {
    // Validated limiter settings; zero window or limit is a startup error
    pub fn rate_limit_config(&self) -> Result<RateLimitConfig> {
        let config = RateLimitConfig::new(self.rate_window_ms, self.rate_limit)?;
        Ok(config.with_header_style(self.headers))
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio's interval panics on zero
        Duration::from_secs(self.sweep_interval.max(1))
    }
}
