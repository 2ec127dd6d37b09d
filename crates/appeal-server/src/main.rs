mod routes;

use std::sync::Arc;
use std::time::Instant;

use appeal_core::{config::Config, Orchestrator};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "appeal_server=info,appeal_core=info,appeal_agent=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env();
    info!(
        backend = ?config.backend,
        model = %config.model,
        concurrency = config.concurrency,
        max_attempts = config.max_attempts,
        "configuration loaded"
    );

    let service = appeal_agent::from_config(&config);
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::from_config(service, &config),
        model: config.model.clone(),
        start_time: Instant::now(),
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    info!("appeal API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
