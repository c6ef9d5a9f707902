use anyhow::Context;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use gmp_backend::app_state::AppState;
use gmp_backend::config::Config;
use gmp_backend::db::pool::{get_db_pool, run_migrations};
use gmp_backend::logging::init_tracing;
use gmp_backend::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = init_tracing(&config.log_dir)?;

    let pool = get_db_pool(&config)
        .await
        .context("Failed to connect to the database")?;

    if config.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to apply database migrations")?;
    }

    let addr = config.bind_addr();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind listener on {addr}"))?;
    info!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await
        .context("Server encountered an error")?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal(pool: PgPool) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }

    info!("Closing database pool...");
    pool.close().await;
    info!("Database pool closed.");
}
