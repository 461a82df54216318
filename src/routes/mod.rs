//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/ws", get(ws::ws_upgrade))
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/categories", get(http::http_categories))
    .route("/api/v1/difficulties", get(http::http_difficulties))
    .route("/api/v1/languages", get(http::http_languages))
    .route("/api/v1/game/start", post(http::http_start_game))
    .route("/api/v1/game/offline/start", post(http::http_start_offline_game))
    .route("/api/v1/game/round", post(http::http_new_round))
    .route("/api/v1/game/fact", post(http::http_reveal_fact))
    .route("/api/v1/game/guess", post(http::http_submit_guess))
    .route("/api/v1/game/hint", post(http::http_hint))
    .route("/api/v1/game/give_up", post(http::http_give_up))
    .route("/api/v1/game/end", post(http::http_end_session))
    .route("/api/v1/offline/status", get(http::http_offline_status))
    .route("/api/v1/leaderboard", get(http::http_leaderboard))
    .route("/api/v1/players/:name/stats", get(http::http_player_stats))
    .route("/api/v1/admin/reset_tracking", post(http::http_reset_tracking))
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .fallback_service(static_service)
}
