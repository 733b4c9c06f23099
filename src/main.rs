use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agenda::config::AppConfig;
use agenda::db::{SqliteStore, Store};
use agenda::handlers;
use agenda::services::booking::complete_elapsed_all;
use agenda::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is not set, using the insecure default");
    }

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.database_url)?);
    tracing::info!(
        database = %config.database_url,
        default_hours = %config.default_working_hours.to_human_readable(),
        "store ready"
    );

    let state = Arc::new(AppState::new(store, config.clone()));

    if config.auto_complete_interval_secs > 0 {
        let sweep_state = state.clone();
        let period = Duration::from_secs(config.auto_complete_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = complete_elapsed_all(sweep_state.store.as_ref(), sweep_state.now()).await {
                    tracing::warn!(error = %e, "auto-completion sweep failed");
                }
            }
        });
    }

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
