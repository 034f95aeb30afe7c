pub mod dashboard;
pub mod rest;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use statscout_engine::Orchestrator;

pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// The control-plane router. Handlers only read or nudge in-memory job state;
/// scraping itself runs on the orchestrator's background task.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard::dashboard_page))
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(rest::job::status))
        .route("/check", get(rest::job::check))
        .route("/start", post(rest::job::start))
        .route("/stop", post(rest::job::stop))
        .route("/scrape_specific", post(rest::job::scrape_specific))
        .with_state(state)
        // The controller is a browser-hosted script on another origin.
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
