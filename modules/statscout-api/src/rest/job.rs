use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use statscout_common::StatScoutError;
use statscout_engine::orchestrator::PREVIEW_ROWS;

use crate::AppState;

#[derive(Deserialize)]
pub struct ScrapeSpecificRequest {
    #[serde(default)]
    target_rows: Vec<String>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.status().await)
}

pub async fn check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.orchestrator.preview(PREVIEW_ROWS).await {
        Ok(preview) => Json(preview).into_response(),
        Err(e) => {
            warn!(error = %e, "Pending check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

pub async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    launch(&state, None, "Scraping started".to_string()).await
}

pub async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let phase = state.orchestrator.stop().await;
    info!(phase = ?phase, "Stop requested via API");
    Json(serde_json::json!({
        "message": "Stop requested; the job halts after the current target",
        "status": "stopped",
    }))
}

pub async fn scrape_specific(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScrapeSpecificRequest>,
) -> impl IntoResponse {
    let rows: Vec<String> = body
        .target_rows
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if rows.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "target_rows is required"})),
        )
            .into_response();
    }
    let message = format!("Scraping started for {} rows", rows.len());
    launch(&state, Some(rows), message).await
}

async fn launch(state: &AppState, filter: Option<Vec<String>>, message: String) -> axum::response::Response {
    match state.orchestrator.start(filter).await {
        // The job handle is dropped; progress is visible through /status.
        Ok(_job) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"message": message, "status": "started"})),
        )
            .into_response(),
        Err(StatScoutError::AlreadyRunning) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "already running"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to start scrape job");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
