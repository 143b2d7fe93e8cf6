//! HTTP surface: a thin axum shell over the pipeline.
//!
//! Both routes are stateless per request: each invocation runs the
//! pipeline (or quote fetch) once and serializes the result. Only the
//! redirect cache survives between requests.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::fetch::{build_client, Deadline};
use crate::pipeline::build_digest;
use crate::resolve::RedirectCache;
use crate::stock::fetch_quote;

/// Short shared cache window for polling dashboard consumers.
const CACHE_CONTROL_SHORT: &str = "public, max-age=15, s-maxage=15";

const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: reqwest::Client,
    pub redirects: Arc<RedirectCache>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        Ok(AppState {
            config: Arc::new(config),
            client: build_client()?,
            redirects: Arc::new(RedirectCache::default()),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/news", get(news))
        .route("/api/stock", get(stock))
        .with_state(state)
}

/// GET /api/news: the merged digest.
///
/// Per-source and per-item failures never reach this layer; the 500 arm
/// only fires on a failure with no narrower isolation boundary, and its
/// body deliberately carries no internal detail.
pub async fn news(State(state): State<AppState>) -> Response {
    match build_digest(&state.config, &state.client, &state.redirects).await {
        Ok(digest) => {
            tracing::info!(items = digest.items.len(), "Digest built");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, CONTENT_TYPE_JSON),
                    (header::CACHE_CONTROL, CACHE_CONTROL_SHORT),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                ],
                Json(digest),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Pipeline failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [
                    (header::CONTENT_TYPE, CONTENT_TYPE_JSON),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                ],
                Json(json!({ "error": "Failed to fetch feeds" })),
            )
                .into_response()
        }
    }
}

/// GET /api/stock: the proxied quote. Always a 200, since the fallback
/// quote covers upstream failure.
pub async fn stock(State(state): State<AppState>) -> Response {
    let deadline = Deadline::from_millis(state.config.fetch.timeout_ms);
    let quote = fetch_quote(&state.client, &state.config.stock, deadline).await;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE_JSON),
            (header::CACHE_CONTROL, CACHE_CONTROL_SHORT),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Json(quote),
    )
        .into_response()
}
