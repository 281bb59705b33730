use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use siquest_api::background::session_cleanup;
use siquest_api::config::AppConfig;
use siquest_api::database::DatabaseManager;
use siquest_api::{app, AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DB_HOST, DB_USER, etc.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting SiQuest API in {:?} mode", config.environment);

    let pool = if config.database.require_on_startup {
        match DatabaseManager::connect(&config).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!("Database connection failed: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match DatabaseManager::connect_lazy(&config) {
            Ok(pool) => {
                tracing::warn!("Database connection deferred until first use");
                pool
            }
            Err(e) => {
                tracing::error!("Invalid database configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = tokio::spawn(session_cleanup::run(
        pool.clone(),
        Duration::from_secs(config.sessions.cleanup_interval_secs.max(1)),
        cleanup_cancel.clone(),
    ));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool, config);
    let app = app(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("SiQuest API listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    cleanup_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), cleanup_handle).await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
