use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::AuthClient;
use crate::series::{chart_points, format_tooltip, ChartMode, ChartPoint};
use crate::strategies::{self, Strategy};
use crate::types::{DataError, SourceHealth, YearOutcome, YearState};
use crate::PerformanceLoader;

/// Application state shared across handlers
pub struct AppState {
    pub loader: PerformanceLoader,
    pub auth: AuthClient,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/strategies", get(list_strategies))
        .route("/performance/{year}", get(get_performance))
        .route("/performance/{year}/chart", get(get_chart))
        .route("/performance/{year}/state", get(get_year_state))
        .route("/auth/google", get(google_login))
        .route("/health", get(health_check))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(e: DataError) -> (StatusCode, String) {
    let status = match e {
        DataError::UnsupportedYear(_) | DataError::UnknownStrategy(_) => StatusCode::BAD_REQUEST,
        DataError::Network(_) | DataError::Fetch { .. } | DataError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, e.to_string())
}

/// GET /strategies - Strategy catalog
pub async fn list_strategies() -> Json<Vec<Strategy>> {
    Json(strategies::all_strategies().into_iter().copied().collect())
}

/// GET /performance/{year} - Display series and stats for a year
pub async fn get_performance(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<Json<YearOutcome>, (StatusCode, String)> {
    info!("Loading performance for {}", year);

    state.loader.load_year(&year).await.map(Json).map_err(|e| {
        warn!("Performance load for {} failed: {}", year, e);
        error_response(e)
    })
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    #[serde(default)]
    mode: ChartMode,
}

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub year: String,
    pub empty: bool,
    pub points: Vec<ChartPoint>,
    pub tooltips: Vec<String>,
}

/// GET /performance/{year}/chart?mode=monthly|cumulative|balance
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartResponse>, (StatusCode, String)> {
    let outcome = state.loader.load_year(&year).await.map_err(error_response)?;

    let points = chart_points(outcome.points(), query.mode);
    let tooltips = points.iter().map(format_tooltip).collect();

    Ok(Json(ChartResponse {
        year,
        empty: outcome.is_empty(),
        points,
        tooltips,
    }))
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub year: String,
    pub state: YearState,
}

/// GET /performance/{year}/state - Slot state without triggering a load
pub async fn get_year_state(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<Json<StateResponse>, (StatusCode, String)> {
    if !state.loader.is_supported(&year) {
        return Err(error_response(DataError::UnsupportedYear(year)));
    }

    let slot = state.loader.state(&year).await;
    Ok(Json(StateResponse { year, state: slot }))
}

/// GET /auth/google - Hand the browser to the auth backend's OAuth flow
pub async fn google_login(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::temporary(&state.auth.google_auth_url())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub strategy: String,
    pub cached_years: Vec<String>,
    pub source: SourceHealth,
}

/// GET /health - Service health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let source = state.loader.health().await;

    Json(HealthResponse {
        status: if source.is_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        strategy: state.loader.strategy_id().to_string(),
        cached_years: state.loader.cached_years().await,
        source,
    })
}
