//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - starting sessions and rounds (online generation or offline store content)
//!   - driving the current round (facts, guesses, hints, giving up)
//!   - persisting finished rounds and, exactly once, the finished session
//!   - read-only views: catalogs, offline status, leaderboard, player stats
//!
//! Every operation resolves the user-facing language explicitly and returns
//! `ApiError` carrying it, so both transports render the same localized text.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::SessionSettings;
use crate::domain::{Category, GameMode};
use crate::error::{EngineError, GameError};
use crate::locale::Language;
use crate::protocol::*;
use crate::round::{GuessOutcome, RoundResult};
use crate::session::GameSession;
use crate::sourcing::{OfflineMode, SourceRequest};
use crate::state::AppState;
use crate::store::best_effort;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
pub const DEFAULT_PLAYER_SESSIONS_LIMIT: usize = 5;

/// Failure of one engine operation, with the language to report it in.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
  pub error: EngineError,
  pub language: Language,
}

impl ApiError {
  pub fn new(error: impl Into<EngineError>, language: Language) -> Self {
    Self { error: error.into(), language }
  }

  pub fn code(&self) -> &'static str {
    self.error.code()
  }

  pub fn message(&self) -> String {
    self.language.locale().engine_error(&self.error)
  }

  pub fn to_out(&self) -> ErrorOut {
    ErrorOut { error: self.code(), message: self.message() }
  }
}

fn language_of(code: Option<&str>) -> Language {
  code.map(Language::from_code).unwrap_or_default()
}

fn blank_to_none(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|s| !s.is_empty())
}

// -------- Catalog views --------

pub fn list_categories(state: &AppState, lang: Option<&str>) -> Vec<CategoryOut> {
  let lang = language_of(lang);
  state
    .categories
    .all()
    .iter()
    .map(|c| CategoryOut {
      name: c.name.clone(),
      display_name: c.display_name(lang).to_string(),
      description: c.display_description(lang).to_string(),
      examples: c.examples.iter().map(|e| c.localized_example(e, lang)).collect(),
    })
    .collect()
}

pub fn list_difficulties(state: &AppState, lang: Option<&str>) -> Vec<DifficultyOut> {
  let lang = language_of(lang);
  state
    .difficulties
    .all()
    .iter()
    .map(|d| DifficultyOut {
      name: d.name.clone(),
      display_name: d.display_name(lang),
      description: d.description(lang),
      score_multiplier: d.score_multiplier,
      hint_penalty: d.hint_penalty,
    })
    .collect()
}

pub fn list_languages() -> Vec<LanguageOut> {
  Language::ALL.iter().map(|l| LanguageOut { code: l.code(), name: l.native_name() }).collect()
}

pub async fn health(state: &AppState) -> HealthOut {
  HealthOut {
    ok: true,
    active_sessions: state.sessions.len().await,
    store_available: state.store.is_available().await,
    generator_enabled: state.sourcer.has_generator(),
  }
}

// -------- Starting rounds --------

/// Named category, or a random one when the name is empty.
fn resolve_category<'a>(state: &'a AppState, name: Option<&str>, lang: Language) -> Result<&'a Category, ApiError> {
  match blank_to_none(name) {
    Some(n) => state.categories.find(n).ok_or_else(|| ApiError::new(GameError::UnknownCategory(n.to_string()), lang)),
    None => state.categories.random_category().ok_or_else(|| ApiError::new(EngineError::ContentUnavailable, lang)),
  }
}

/// Sources an item for the session's next online round and opens the round.
async fn open_online_round(state: &AppState, session: &mut GameSession, category: Option<&str>) -> Result<RoundStartOut, ApiError> {
  let lang = session.language();
  let category = resolve_category(state, category, lang)?.clone();
  let pick = state.categories.pick_subcategory(&category, lang);

  let req = SourceRequest {
    category: category.name.clone(),
    subcategory: pick.as_ref().map(|p| p.localized.clone()),
    difficulty: session.difficulty().clone(),
    language: lang,
    session_key: Some(session.key().to_string()),
    player_name: Some(session.player_name().to_string()),
  };
  let sourced = state.sourcer.source_item(&req).await;
  if sourced.item.is_error() {
    warn!(target: "guessr_backend", session = %session.key(), category = %category.name, attempts = sourced.attempts, "No playable content; round not started");
    return Err(ApiError::new(EngineError::ContentUnavailable, lang));
  }

  session
    .start_round(&category.name, req.subcategory, sourced.item)
    .map_err(|e| ApiError::new(e, lang))?;
  Ok(round_start_out(session, category.display_name(lang), None))
}

/// Opens the session's next round from stored content.
async fn open_offline_round(
  state: &AppState,
  session: &mut GameSession,
  category: Option<&str>,
  mode: OfflineMode,
) -> Result<RoundStartOut, ApiError> {
  let lang = session.language();
  let category = match blank_to_none(category) {
    Some(_) => Some(resolve_category(state, category, lang)?.clone()),
    None => None,
  };
  let filter = category.as_ref().map(|c| c.name.as_str());
  let difficulty = session.difficulty().name.clone();

  let status = state.sourcer.offline_status(filter, Some(difficulty.as_str()), lang).await;
  let item = state
    .sourcer
    .source_offline(filter, Some(difficulty.as_str()), lang, mode)
    .await
    .map_err(|e| ApiError::new(e, lang))?;

  let category_name = item.category.clone().or_else(|| category.as_ref().map(|c| c.name.clone())).unwrap_or_default();
  let display = state
    .categories
    .find(&category_name)
    .map(|c| c.display_name(lang).to_string())
    .unwrap_or_else(|| category_name.clone());
  let subcategory = item.subcategory.clone();

  session.start_round(&category_name, subcategory, item).map_err(|e| ApiError::new(e, lang))?;
  let matching = if mode == OfflineMode::Consume { status.unused } else { status.total };
  Ok(round_start_out(session, &display, Some(matching)))
}

fn round_start_out(session: &GameSession, category_display: &str, offline_questions: Option<u64>) -> RoundStartOut {
  let round = session.current_round();
  RoundStartOut {
    session_id: session.key().to_string(),
    player_name: session.player_name().to_string(),
    language: session.language().code().to_string(),
    category: round.map(|r| r.category().to_string()).unwrap_or_default(),
    category_display: category_display.to_string(),
    subcategory: round.and_then(|r| r.subcategory().map(str::to_string)),
    facts_available: round.map_or(0, |r| r.total_facts()),
    difficulty: session.difficulty().name.clone(),
    score_multiplier: session.difficulty().score_multiplier,
    mode: session.mode(),
    source: round.map_or(crate::domain::ItemSource::Error, |r| r.item().source),
    question_id: round.and_then(|r| r.item().question_id),
    rounds_completed: session.rounds_completed(),
    max_rounds: session.max_rounds(),
    total_score: session.total_score(),
    game_complete: session.is_game_complete(),
    hints_available: session.settings().max_hints,
    hints_used: 0,
    hint_display: round.map(|r| r.hint_display()).unwrap_or_default(),
    offline_questions,
  }
}

fn new_session(state: &AppState, req: &StartGameIn, mode: GameMode) -> GameSession {
  let lang = language_of(req.language.as_deref());
  let difficulty = state.difficulties.resolve(blank_to_none(req.difficulty.as_deref()));
  GameSession::new(
    req.player_name.as_deref().unwrap_or_default(),
    lang,
    req.max_rounds,
    difficulty,
    mode,
    state.round_settings,
  )
}

/// New online session with its first round. The session is only registered
/// once the first round is playable.
#[instrument(level = "info", skip(state, req), fields(category = ?req.category, difficulty = ?req.difficulty, language = ?req.language))]
pub async fn start_game(state: &AppState, req: StartGameIn) -> Result<RoundStartOut, ApiError> {
  let mut session = new_session(state, &req, GameMode::Online);
  let out = open_online_round(state, &mut session, req.category.as_deref()).await?;
  state.sessions.insert(session).await;
  info!(target: "guessr_backend", session = %out.session_id, category = %out.category, source = ?out.source, "Game started");
  Ok(out)
}

/// New offline session. The first item is consumed (marked used).
#[instrument(level = "info", skip(state, req), fields(category = ?req.category, difficulty = ?req.difficulty, language = ?req.language))]
pub async fn start_offline_game(state: &AppState, req: StartGameIn) -> Result<RoundStartOut, ApiError> {
  let mut session = new_session(state, &req, GameMode::Offline);
  let out = open_offline_round(state, &mut session, req.category.as_deref(), OfflineMode::Consume).await?;
  state.sessions.insert(session).await;
  info!(target: "guessr_backend", session = %out.session_id, category = %out.category, "Offline game started");
  Ok(out)
}

/// Next round of an existing session. Offline sessions replay stored content.
#[instrument(level = "info", skip(state, req), fields(session = %req.session_id, category = ?req.category))]
pub async fn new_round(state: &AppState, req: NewRoundIn) -> Result<RoundStartOut, ApiError> {
  let fallback_lang = language_of(req.language.as_deref());
  let handle = state
    .sessions
    .get(&req.session_id)
    .await
    .ok_or_else(|| ApiError::new(GameError::SessionNotFound, fallback_lang))?;
  let mut session = handle.lock().await;

  if let Some(code) = blank_to_none(req.language.as_deref()) {
    session.set_language(Language::from_code(code));
  }
  let lang = session.language();
  // refuse before spending a generation on a round that cannot start
  if session.is_ended() || session.is_game_complete() {
    return Err(ApiError::new(GameError::SessionComplete, lang));
  }
  if session.current_round().is_some_and(|r| !r.is_finished()) {
    return Err(ApiError::new(GameError::RoundInProgress, lang));
  }
  if let Some(name) = blank_to_none(req.difficulty.as_deref()) {
    let level = state.difficulties.resolve(Some(name));
    session.set_difficulty(level);
  }

  match session.mode() {
    GameMode::Online => open_online_round(state, &mut session, req.category.as_deref()).await,
    GameMode::Offline => open_offline_round(state, &mut session, req.category.as_deref(), OfflineMode::Replay).await,
  }
}

// -------- Driving the current round --------

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn reveal_fact(state: &AppState, session_id: &str) -> Result<FactOut, ApiError> {
  let handle = state
    .sessions
    .get(session_id)
    .await
    .ok_or_else(|| ApiError::new(GameError::SessionNotFound, Language::default()))?;
  let mut session = handle.lock().await;
  let lang = session.language();
  let fact = session.reveal_fact().map_err(|e| ApiError::new(e, lang))?;
  Ok(FactOut { fact: fact.text, fact_number: fact.number, total_facts: fact.total })
}

#[instrument(level = "info", skip(state, guess), fields(%session_id, guess_len = guess.len()))]
pub async fn submit_guess(state: &AppState, session_id: &str, guess: &str) -> Result<GuessOut, ApiError> {
  let handle = state
    .sessions
    .get(session_id)
    .await
    .ok_or_else(|| ApiError::new(GameError::SessionNotFound, Language::default()))?;
  let mut session = handle.lock().await;
  let lang = session.language();
  let outcome = session.submit_guess(guess).map_err(|e| ApiError::new(e, lang))?;

  match outcome {
    GuessOutcome::Miss(miss) => {
      let locale = lang.locale();
      let message = locale.feedback(miss.tier, miss.similarity) + &locale.attempts_remaining(miss.attempts_remaining);
      Ok(GuessOut::Miss(MissOut {
        correct: false,
        similarity: miss.similarity,
        tier: miss.tier,
        message,
        failed_attempts: miss.failed_attempts,
        max_failed_attempts: miss.max_failed_attempts,
        attempts_remaining: miss.attempts_remaining,
      }))
    }
    GuessOutcome::Finished(result) => Ok(GuessOut::Finished(round_over(state, &mut session, &result).await)),
  }
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn give_up(state: &AppState, session_id: &str) -> Result<RoundResultOut, ApiError> {
  let handle = state
    .sessions
    .get(session_id)
    .await
    .ok_or_else(|| ApiError::new(GameError::SessionNotFound, Language::default()))?;
  let mut session = handle.lock().await;
  let lang = session.language();
  let result = session.give_up().map_err(|e| ApiError::new(e, lang))?;
  Ok(round_over(state, &mut session, &result).await)
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn request_hint(state: &AppState, session_id: &str) -> Result<HintOut, ApiError> {
  let handle = state
    .sessions
    .get(session_id)
    .await
    .ok_or_else(|| ApiError::new(GameError::SessionNotFound, Language::default()))?;
  let mut session = handle.lock().await;
  let lang = session.language();
  let reveal = session.request_hint().map_err(|e| ApiError::new(e, lang))?;

  let penalty = session.current_round().map_or(0, |r| r.difficulty().hint_penalty);
  Ok(HintOut {
    success: true,
    message: lang.locale().letter_revealed(reveal.hints_remaining),
    display: reveal.display,
    hints_used: reveal.hints_used,
    hints_remaining: reveal.hints_remaining,
    max_hints: reveal.hints_used + reveal.hints_remaining,
    hint_penalty: penalty,
    total_hint_penalty: penalty * reveal.hints_used,
  })
}

/// Persists the finished round and, on natural completion, the session.
async fn round_over(state: &AppState, session: &mut GameSession, result: &RoundResult) -> RoundResultOut {
  if let Some(record) = session.last_record().cloned() {
    best_effort("save_round", state.store.save_round(&record, None), false).await;
  }
  let session_saved = if session.is_game_complete() {
    persist_session(state, session).await
  } else {
    false
  };

  let locale = session.language().locale();
  let message = if result.gave_up {
    locale.gave_up()
  } else if result.correct {
    locale.feedback(result.tier, result.similarity)
  } else {
    locale.auto_revealed(result.max_failed_attempts)
  };

  RoundResultOut {
    correct: result.correct,
    answer: result.answer.clone(),
    outcome: result.outcome,
    similarity: result.similarity,
    match_type: result.match_type,
    time_taken_secs: result.elapsed.as_secs_f64(),
    facts_used: result.facts_used,
    base_score: result.base_score,
    score_multiplier: result.score_multiplier,
    round_score: result.round_score,
    total_score: session.total_score(),
    rounds_completed: session.rounds_completed(),
    max_rounds: session.max_rounds(),
    game_complete: session.is_game_complete(),
    auto_revealed: result.auto_revealed,
    gave_up: result.gave_up,
    failed_attempts: result.failed_attempts,
    max_failed_attempts: result.max_failed_attempts,
    hints_used: result.hints_used,
    hint_display: result.hint_display.clone(),
    message,
    session_saved,
  }
}

/// Writes the session summary unless it is already stored. True only when this
/// call wrote it. A failed write leaves the session unsaved so a later call
/// (explicit end, idle eviction) retries. Sessions without rounds are not saved.
async fn persist_session(state: &AppState, session: &mut GameSession) -> bool {
  if session.is_saved() {
    return false;
  }
  let summary = session.finalize();
  if summary.rounds_played == 0 {
    return false;
  }
  let id = best_effort("save_session", async { state.store.save_session(&summary).await.map(Some) }, None).await;
  match id {
    Some(id) => {
      session.mark_saved(id);
      info!(target: "session", session = %summary.session_key, id, total_score = summary.total_score, "Session persisted");
      true
    }
    None => {
      warn!(target: "session", session = %summary.session_key, "Session not persisted");
      false
    }
  }
}

/// Ends the session: saves it (unless already saved) and drops it from the registry.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn end_session(state: &AppState, session_id: &str) -> Result<EndOut, ApiError> {
  let handle = state
    .sessions
    .remove(session_id)
    .await
    .ok_or_else(|| ApiError::new(GameError::SessionNotFound, Language::default()))?;
  let mut session = handle.lock().await;
  persist_session(state, &mut session).await;
  let summary = session.finalize();
  Ok(EndOut {
    message: session.language().locale().session_ended(),
    total_score: summary.total_score,
    rounds_completed: summary.rounds_played,
    session_saved: session.is_saved(),
    summary,
  })
}

/// Drops sessions idle for at least `idle_timeout`, saving them first.
/// Sessions busy with a request are skipped until the next sweep.
#[instrument(level = "debug", skip(state))]
pub async fn evict_idle_sessions(state: &AppState, idle_timeout: Duration) -> usize {
  let now = Instant::now();
  let mut evicted = 0;
  for (key, handle) in state.sessions.snapshot().await {
    let Ok(mut session) = handle.try_lock() else {
      continue;
    };
    if session.idle_for(now) < idle_timeout {
      continue;
    }
    persist_session(state, &mut session).await;
    state.sessions.remove(&key).await;
    info!(target: "session", session = %key, saved = session.is_saved(), rounds = session.rounds_completed(), "Idle session evicted");
    evicted += 1;
  }
  evicted
}

/// Background sweep; runs for the life of the process.
pub async fn run_session_sweeper(state: Arc<AppState>, settings: SessionSettings) {
  let mut ticker = tokio::time::interval(settings.sweep_interval());
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  info!(target: "session", idle_timeout_secs = settings.idle_timeout_secs, "Session sweeper started");
  loop {
    ticker.tick().await;
    let evicted = evict_idle_sessions(&state, settings.idle_timeout()).await;
    if evicted > 0 {
      let active = state.sessions.len().await;
      debug!(target: "session", evicted, active, "Sweep finished");
    }
  }
}

// -------- Read-only views --------

pub async fn offline_status(state: &AppState, q: &OfflineStatusQuery) -> OfflineStatusOut {
  let lang = language_of(q.lang.as_deref());
  let category = blank_to_none(q.category.as_deref()).map(|c| {
    state.categories.find(c).map(|cat| cat.name.clone()).unwrap_or_else(|| c.to_string())
  });
  let difficulty = state.difficulties.resolve(blank_to_none(q.difficulty.as_deref())).name;
  let status = state.sourcer.offline_status(category.as_deref(), Some(difficulty.as_str()), lang).await;
  OfflineStatusOut { status, language: lang.code().to_string(), category, difficulty }
}

pub async fn leaderboard(state: &AppState, limit: Option<usize>) -> LeaderboardOut {
  let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
  LeaderboardOut {
    sessions: best_effort("top_sessions", state.store.top_sessions(limit), Vec::new()).await,
    stats: best_effort("global_stats", state.store.global_stats(), Default::default()).await,
  }
}

pub async fn player_stats(state: &AppState, player_name: &str, limit: Option<usize>) -> PlayerStatsOut {
  let limit = limit.unwrap_or(DEFAULT_PLAYER_SESSIONS_LIMIT);
  let fallback = PlayerStatsOut { player_name: player_name.to_string(), ..Default::default() };
  best_effort("player_stats", state.store.player_stats(player_name, limit), fallback).await
}

/// Clears process-local duplicate tracking and subcategory usage counters.
/// Persisted history is untouched.
#[instrument(level = "info", skip(state))]
pub fn reset_tracking(state: &AppState) {
  state.sourcer.reset_tracking();
  state.categories.reset_usage();
  info!(target: "sourcing", "Reset item tracking and category usage counts");
}
