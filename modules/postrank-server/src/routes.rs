use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use postrank_engine::ScoringJob;

use crate::auth;

/// Shared state for the trigger endpoint.
pub struct AppState {
    pub job: Arc<ScoringJob>,
    pub job_secret: String,
    /// Held for the duration of a run. A second trigger while it is held gets 409.
    pub run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(job: Arc<ScoringJob>, job_secret: impl Into<String>) -> Self {
        Self {
            job,
            job_secret: job_secret.into(),
            run_lock: Mutex::new(()),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunResponse {
    updated: u64,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs/score-posts", post(score_posts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn score_posts(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(e) = auth::authorize(&headers, &state.job_secret) {
        warn!(error = %e, "Rejected scoring trigger");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response();
    }

    let Ok(_guard) = state.run_lock.try_lock() else {
        warn!("Scoring trigger ignored, a run is already in progress");
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "scoring run already in progress"})),
        )
            .into_response();
    };

    info!("Scoring run triggered");
    match state.job.run(Utc::now()).await {
        Ok(stats) => Json(RunResponse {
            updated: stats.written,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Scoring run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "scoring run failed"})),
            )
                .into_response()
        }
    }
}
