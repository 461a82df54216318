//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{GameMode, ItemSource, MatchType, RoundOutcome};
use crate::matcher::FeedbackTier;
use crate::session::SessionSummary;
use crate::sourcing::OfflineStatus;
use crate::store::{GlobalStats, PlayerStats};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  StartGame(StartGameIn),
  StartOfflineGame(StartGameIn),
  NewRound(NewRoundIn),
  RevealFact { session_id: String },
  SubmitGuess { session_id: String, guess: String },
  Hint { session_id: String },
  GiveUp { session_id: String },
  EndSession { session_id: String },
  OfflineStatus(OfflineStatusQuery),
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  RoundStarted { round: RoundStartOut },
  Fact { fact: FactOut },
  GuessResult { result: GuessOut },
  Hint { hint: HintOut },
  RoundOver { result: RoundResultOut },
  SessionEnded { session: EndOut },
  OfflineStatus { status: OfflineStatusOut },
  Error { error: String, message: String },
}

//
// HTTP request DTOs (also embedded in WS messages)
//

#[derive(Debug, Default, Deserialize)]
pub struct StartGameIn {
  #[serde(default)]
  pub player_name: Option<String>,
  #[serde(default)]
  pub language: Option<String>,
  /// Empty or missing picks a random category.
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub max_rounds: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NewRoundIn {
  pub session_id: String,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionIn {
  pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GuessIn {
  pub session_id: String,
  pub guess: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
  #[serde(default)]
  pub lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OfflineStatusQuery {
  #[serde(default, alias = "language")]
  pub lang: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub difficulty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
  #[serde(default)]
  pub limit: Option<usize>,
}

//
// Response DTOs
//

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub active_sessions: usize,
  pub store_available: bool,
  pub generator_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryOut {
  pub name: String,
  pub display_name: String,
  pub description: String,
  pub examples: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DifficultyOut {
  pub name: String,
  pub display_name: String,
  pub description: String,
  pub score_multiplier: f64,
  pub hint_penalty: u32,
}

#[derive(Debug, Serialize)]
pub struct LanguageOut {
  pub code: &'static str,
  pub name: &'static str,
}

/// Sent whenever a round starts, online or offline.
#[derive(Debug, Serialize)]
pub struct RoundStartOut {
  pub session_id: String,
  pub player_name: String,
  pub language: String,
  pub category: String,
  pub category_display: String,
  pub subcategory: Option<String>,
  pub facts_available: u32,
  pub difficulty: String,
  pub score_multiplier: f64,
  pub mode: GameMode,
  pub source: ItemSource,
  pub question_id: Option<i64>,
  pub rounds_completed: u32,
  pub max_rounds: Option<u32>,
  pub total_score: u64,
  pub game_complete: bool,
  pub hints_available: u32,
  pub hints_used: u32,
  pub hint_display: String,
  /// Offline rounds only: how many stored items matched the filters.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub offline_questions: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FactOut {
  pub fact: String,
  pub fact_number: u32,
  pub total_facts: u32,
}

/// A wrong guess that leaves the round open.
#[derive(Debug, Serialize)]
pub struct MissOut {
  pub correct: bool,
  pub similarity: f64,
  pub tier: FeedbackTier,
  pub message: String,
  pub failed_attempts: u32,
  pub max_failed_attempts: u32,
  pub attempts_remaining: u32,
}

/// Everything the client needs to render a finished round.
#[derive(Debug, Serialize)]
pub struct RoundResultOut {
  pub correct: bool,
  pub answer: String,
  pub outcome: RoundOutcome,
  pub similarity: f64,
  pub match_type: MatchType,
  pub time_taken_secs: f64,
  pub facts_used: u32,
  pub base_score: u32,
  pub score_multiplier: f64,
  pub round_score: u32,
  pub total_score: u64,
  pub rounds_completed: u32,
  pub max_rounds: Option<u32>,
  pub game_complete: bool,
  pub auto_revealed: bool,
  pub gave_up: bool,
  pub failed_attempts: u32,
  pub max_failed_attempts: u32,
  pub hints_used: u32,
  pub hint_display: String,
  pub message: String,
  pub session_saved: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GuessOut {
  Miss(MissOut),
  Finished(RoundResultOut),
}

#[derive(Debug, Serialize)]
pub struct HintOut {
  pub success: bool,
  pub message: String,
  pub display: String,
  pub hints_used: u32,
  pub hints_remaining: u32,
  pub max_hints: u32,
  /// Display only; never subtracted from the round score.
  pub hint_penalty: u32,
  pub total_hint_penalty: u32,
}

#[derive(Debug, Serialize)]
pub struct EndOut {
  pub message: String,
  pub total_score: u64,
  pub rounds_completed: u32,
  pub session_saved: bool,
  pub summary: SessionSummary,
}

#[derive(Debug, Serialize)]
pub struct OfflineStatusOut {
  #[serde(flatten)]
  pub status: OfflineStatus,
  pub language: String,
  pub category: Option<String>,
  pub difficulty: String,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardOut {
  pub sessions: Vec<SessionSummary>,
  pub stats: GlobalStats,
}

pub type PlayerStatsOut = PlayerStats;

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: &'static str,
  pub message: String,
}
