use anyhow::anyhow;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curio::config::AppConfig;
use curio::infra::{cache::RedisCache, db::Db};
use curio::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = Db::connect(&config).await?;

    match config.app_mode.as_str() {
        "api" => serve(&config, db).await,
        "seed" => {
            tracing::info!("running seed job");
            jobs::seed::run(&db, &config).await
        }
        other => Err(anyhow!("unknown APP_MODE: {}", other)),
    }
}

async fn serve(config: &AppConfig, db: Db) -> anyhow::Result<()> {
    let cache = RedisCache::connect(&config.redis_url).await?;
    let state = AppState::new(config, db, cache);

    // ConnectInfo feeds the per-IP rate limit.
    let app = http::router(state)
        .layer(TraceLayer::new_for_http())
        .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, env = ?config.app_env, "curio api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "cannot listen for Ctrl+C");
            }
        }
        _ = terminate => {}
    }

    tracing::info!("shutting down");
}
