use anyhow::Context;
use clap::Parser;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use schedule_api::config::{config, StorageBackend};
use schedule_api::database::{DatabaseManager, MemoryStorage, PgStorage, Storage};
use schedule_api::{is_production, router, AppState};

#[derive(Parser, Debug)]
#[command(name = "schedule-api", version, about = "Schedule API server")]
struct Cli {
    /// Port to listen on (overrides API_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep everything in process memory instead of Postgres
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(!is_production!())
        .init();

    let mut config = config().clone();
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if cli.memory {
        config.storage = StorageBackend::Memory;
    }
    info!("Starting Schedule API in {:?} mode", config.environment);

    let (storage, pool): (Arc<dyn Storage>, Option<PgPool>) = match config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on shutdown");
            (Arc::new(MemoryStorage::new()), None)
        }
        StorageBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to database")?;
            (Arc::new(PgStorage::new(pool.clone(), &config.database)), Some(pool))
        }
    };

    let state = AppState::new(storage, &config);
    let sessions = state.sessions.clone();
    let app = router(state, &config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Schedule API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let dropped = sessions.clear().await;
    info!("Dropped {} open sessions", dropped);
    if let Some(pool) = pool {
        DatabaseManager::close(&pool).await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
