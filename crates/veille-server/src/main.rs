mod api;
mod middleware;
mod pipeline;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
    pipeline::Pipeline,
};

/// How long in-flight scrapes and sync ticks get to wind down after a
/// shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(veille_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = veille_db::PoolConfig::from_app_config(&config);
    let pool = veille_db::connect_pool(&config.database_url, pool_config).await?;
    veille_db::run_migrations(&pool).await?;

    let cancel = CancellationToken::new();
    let pipeline = Arc::new(Pipeline::from_config(
        pool.clone(),
        &config,
        cancel.clone(),
    )?);
    let mut scheduler = scheduler::build_scheduler(Arc::clone(&pipeline), &config).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        veille_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            pipeline: Arc::clone(&pipeline),
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "veille server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    if let Err(err) = scheduler.shutdown().await {
        tracing::warn!(error = %err, "scheduler did not shut down cleanly");
    }
    pipeline.drain(SHUTDOWN_GRACE).await;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM, cancelling `cancel` so running scrapes
/// stop before their next keyword.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    cancel.cancel();
}
