use clap::Parser; // for cli
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use limit_gateway::config::Args;
use limit_gateway::metrics;
use limit_gateway::rate_limit::RateLimiter;
use limit_gateway::client_key::ClientKeyResolver;
use limit_gateway::server::{build_router, serve};
use limit_gateway::state::AppState;
use limit_gateway::sweeper::window_sweeper;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    init_tracing(args.log_json);

    // bad window/limit values stop us before we listen
    let config = args.rate_limit_config()?;
    metrics::register();

    let limiter = Arc::new(RateLimiter::new(
        config,
        ClientKeyResolver::new(args.trust_proxy),
    ));

    // spawn the background sweeper
    tokio::spawn(window_sweeper(Arc::clone(&limiter), args.sweep_interval()));

    let state = Arc::new(AppState::new(Arc::clone(&limiter)));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server is running on port {}", args.port);
    info!(trust_proxy = %args.trust_proxy, "Client addresses resolved");
    info!(
        "Rate limit: {} requests per {} ms ({:?} headers)",
        args.rate_limit, args.rate_window_ms, args.headers
    );

    serve(listener, app, shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
