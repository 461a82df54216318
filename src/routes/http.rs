//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::{EngineError, GameError, SourcingError};
use crate::logic::{self, ApiError};
use crate::protocol::*;
use crate::state::AppState;

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match &self.error {
      EngineError::Game(GameError::SessionNotFound) => StatusCode::NOT_FOUND,
      EngineError::Game(GameError::InvalidGuess | GameError::UnknownCategory(_)) => StatusCode::BAD_REQUEST,
      EngineError::Game(_) => StatusCode::CONFLICT,
      EngineError::Sourcing(SourcingError::NoOfflineContent { .. }) => StatusCode::NOT_FOUND,
      EngineError::Sourcing(SourcingError::OfflineFetchFailed { .. }) | EngineError::ContentUnavailable => {
        StatusCode::SERVICE_UNAVAILABLE
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    warn!(target: "guessr_backend", code = self.code(), %status, "Request refused");
    (status, Json(self.to_out())).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::health(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_categories(State(state): State<Arc<AppState>>, Query(q): Query<LangQuery>) -> impl IntoResponse {
  Json(logic::list_categories(&state, q.lang.as_deref()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_difficulties(State(state): State<Arc<AppState>>, Query(q): Query<LangQuery>) -> impl IntoResponse {
  Json(logic::list_difficulties(&state, q.lang.as_deref()))
}

#[instrument(level = "info")]
pub async fn http_languages() -> impl IntoResponse {
  Json(logic::list_languages())
}

#[instrument(level = "info", skip(state, body), fields(category = ?body.category, difficulty = ?body.difficulty))]
pub async fn http_start_game(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartGameIn>,
) -> Result<Json<RoundStartOut>, ApiError> {
  let out = logic::start_game(&state, body).await?;
  info!(target: "guessr_backend", session = %out.session_id, category = %out.category, "HTTP game started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(category = ?body.category, difficulty = ?body.difficulty))]
pub async fn http_start_offline_game(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartGameIn>,
) -> Result<Json<RoundStartOut>, ApiError> {
  let out = logic::start_offline_game(&state, body).await?;
  info!(target: "guessr_backend", session = %out.session_id, category = %out.category, "HTTP offline game started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_new_round(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NewRoundIn>,
) -> Result<Json<RoundStartOut>, ApiError> {
  Ok(Json(logic::new_round(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_reveal_fact(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> Result<Json<FactOut>, ApiError> {
  Ok(Json(logic::reveal_fact(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, guess_len = body.guess.len()))]
pub async fn http_submit_guess(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GuessIn>,
) -> Result<Json<GuessOut>, ApiError> {
  Ok(Json(logic::submit_guess(&state, &body.session_id, &body.guess).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_hint(State(state): State<Arc<AppState>>, Json(body): Json<SessionIn>) -> Result<Json<HintOut>, ApiError> {
  Ok(Json(logic::request_hint(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_give_up(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> Result<Json<RoundResultOut>, ApiError> {
  Ok(Json(logic::give_up(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> Result<Json<EndOut>, ApiError> {
  let out = logic::end_session(&state, &body.session_id).await?;
  info!(target: "guessr_backend", session = %body.session_id, total_score = out.total_score, saved = out.session_saved, "HTTP session ended");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_offline_status(
  State(state): State<Arc<AppState>>,
  Query(q): Query<OfflineStatusQuery>,
) -> impl IntoResponse {
  Json(logic::offline_status(&state, &q).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_leaderboard(State(state): State<Arc<AppState>>, Query(q): Query<LimitQuery>) -> impl IntoResponse {
  Json(logic::leaderboard(&state, q.limit).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_player_stats(
  State(state): State<Arc<AppState>>,
  Path(name): Path<String>,
  Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
  Json(logic::player_stats(&state, &name, q.limit).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_tracking(State(state): State<Arc<AppState>>) -> StatusCode {
  logic::reset_tracking(&state);
  StatusCode::NO_CONTENT
}
