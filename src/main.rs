use std::sync::Arc;
use tracing::{info, Level};

use performance_feed::auth::AuthClient;
use performance_feed::handlers::{self, AppState};
use performance_feed::{PerformanceLoader, ResultsApiClient, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Performance Feed Service...");

    let settings = Settings::load()?;
    info!(
        "Strategy {} via {}, years {:?}",
        settings.strategy_id, settings.results_base_url, settings.supported_years
    );

    let results = Arc::new(ResultsApiClient::new(
        &settings.results_base_url,
        settings.request_timeout(),
    )?);
    info!("✓ Results API client initialized");

    let loader = PerformanceLoader::new(
        results,
        &settings.strategy_id,
        settings.supported_years.clone(),
    )?;

    let auth = AuthClient::new(&settings.auth_base_url, settings.request_timeout())?;
    info!("✓ Auth client initialized");

    let state = Arc::new(AppState { loader, auth });
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    info!("🚀 Performance Feed Service listening on port {}", settings.port);

    axum::serve(listener, app).await?;

    Ok(())
}
