//! TokenForge Server Binary
//!
//! Runs the token engine behind its HTTP API.

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use tokenforge_server::{config, create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config::log_level())
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let engine = match config.build_engine() {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to build token engine");
            std::process::exit(1);
        }
    };

    // Load the signing key now so a bad key fails startup, not the first request
    if let Err(e) = engine.key_set() {
        error!(error = %e, "Failed to load key material");
        std::process::exit(1);
    }

    let policy = *engine.policy();
    info!(
        policy = %policy,
        kid = %engine.keys().key_id(),
        fetcher = engine.fetcher_description(),
        port = config.port,
        "Starting token server"
    );
    for toggle in policy.enabled_toggles() {
        warn!(toggle = %toggle, "SECURITY: vulnerability toggle enabled");
    }
    for conflict in policy.conflicts() {
        let toggles: Vec<&str> = conflict.toggles.iter().map(|t| t.as_str()).collect();
        warn!(
            toggles = %toggles.join("+"),
            outcome = conflict.outcome,
            "SECURITY: conflicting toggles"
        );
    }

    let state = Arc::new(AppState { engine });
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Token server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
