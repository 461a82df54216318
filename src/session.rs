//! Session aggregator: owns the current round, folds finished rounds into the
//! running totals and produces the summary handed to persistence.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{DifficultyLevel, GameMode, Item, RoundRecord};
use crate::error::GameError;
use crate::hint::HintReveal;
use crate::locale::Language;
use crate::round::{GuessOutcome, RevealedFact, Round, RoundResult, RoundSettings, RoundSetup};
use crate::scoring::{Achievement, Grade};

/// Finished session, as persisted and shown on the leaderboard.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
  pub session_key: String,
  /// Store id, once persisted.
  pub id: Option<i64>,
  pub player_name: String,
  pub language: Language,
  pub difficulty: String,
  pub game_mode: GameMode,
  pub start_time: DateTime<Utc>,
  pub end_time: DateTime<Utc>,
  pub total_score: u64,
  pub rounds_played: u32,
  pub rounds_won: u32,
  pub rounds_lost: u32,
  pub average_facts_used: f64,
  pub average_time_secs: f64,
  pub best_round_score: u32,
  pub grade: Grade,
  pub achievements: Vec<Achievement>,
  pub rounds: Vec<RoundRecord>,
}

#[derive(Debug)]
pub struct GameSession {
  key: String,
  player_name: String,
  language: Language,
  max_rounds: Option<u32>,
  rounds_completed: u32,
  total_score: u64,
  start_time: DateTime<Utc>,
  end_time: Option<DateTime<Utc>>,
  difficulty: DifficultyLevel,
  mode: GameMode,
  settings: RoundSettings,
  current: Option<Round>,
  history: Vec<RoundRecord>,
  /// Store id once the summary was actually written.
  saved_id: Option<i64>,
  last_active: Instant,
}

impl GameSession {
  pub fn new(
    player_name: &str,
    language: Language,
    max_rounds: Option<u32>,
    difficulty: DifficultyLevel,
    mode: GameMode,
    settings: RoundSettings,
  ) -> Self {
    let player_name = match player_name.trim() {
      "" => "Anonymous".to_string(),
      p => p.to_string(),
    };
    Self {
      key: Uuid::new_v4().to_string(),
      player_name,
      language,
      // A cap of zero would complete the session before it starts.
      max_rounds: max_rounds.filter(|m| *m > 0),
      rounds_completed: 0,
      total_score: 0,
      start_time: Utc::now(),
      end_time: None,
      difficulty,
      mode,
      settings,
      current: None,
      history: Vec::new(),
      saved_id: None,
      last_active: Instant::now(),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }
  pub fn player_name(&self) -> &str {
    &self.player_name
  }
  pub fn language(&self) -> Language {
    self.language
  }
  pub fn max_rounds(&self) -> Option<u32> {
    self.max_rounds
  }
  pub fn rounds_completed(&self) -> u32 {
    self.rounds_completed
  }
  pub fn total_score(&self) -> u64 {
    self.total_score
  }
  pub fn difficulty(&self) -> &DifficultyLevel {
    &self.difficulty
  }
  pub fn mode(&self) -> GameMode {
    self.mode
  }
  pub fn settings(&self) -> &RoundSettings {
    &self.settings
  }
  pub fn current_round(&self) -> Option<&Round> {
    self.current.as_ref()
  }
  pub fn history(&self) -> &[RoundRecord] {
    &self.history
  }
  pub fn last_record(&self) -> Option<&RoundRecord> {
    self.history.last()
  }
  pub fn is_ended(&self) -> bool {
    self.end_time.is_some()
  }
  pub fn is_saved(&self) -> bool {
    self.saved_id.is_some()
  }

  /// Time since the last player action.
  pub fn idle_for(&self, now: Instant) -> Duration {
    now.saturating_duration_since(self.last_active)
  }

  fn touch(&mut self) {
    self.last_active = Instant::now();
  }

  pub fn is_game_complete(&self) -> bool {
    self.max_rounds.is_some_and(|m| self.rounds_completed >= m)
  }

  /// Difficulty may change between rounds; the pending round keeps its own.
  pub fn set_difficulty(&mut self, level: DifficultyLevel) {
    self.difficulty = level;
  }

  pub fn set_language(&mut self, language: Language) {
    self.language = language;
  }

  /// Fails while the previous round is still pending or once the cap is reached.
  pub fn start_round(&mut self, category: &str, subcategory: Option<String>, item: Item) -> Result<&Round, GameError> {
    if self.is_ended() || self.is_game_complete() {
      return Err(GameError::SessionComplete);
    }
    if self.current.as_ref().is_some_and(|r| !r.is_finished()) {
      return Err(GameError::RoundInProgress);
    }
    let setup = RoundSetup {
      category: category.to_string(),
      subcategory,
      item,
      difficulty: self.difficulty.clone(),
      language: self.language,
      mode: self.mode,
    };
    debug!(target: "session", session = %self.key, round = self.rounds_completed + 1, "Starting round");
    self.touch();
    Ok(self.current.insert(Round::new(setup, self.settings)))
  }

  pub fn reveal_fact(&mut self) -> Result<RevealedFact, GameError> {
    self.touch();
    self.round_mut()?.reveal_next_fact()
  }

  pub fn request_hint(&mut self) -> Result<HintReveal, GameError> {
    self.touch();
    self.round_mut()?.request_hint()
  }

  pub fn submit_guess(&mut self, text: &str) -> Result<GuessOutcome, GameError> {
    self.touch();
    let outcome = self.round_mut()?.submit_guess(text)?;
    if let GuessOutcome::Finished(result) = &outcome {
      self.fold(result);
    }
    Ok(outcome)
  }

  pub fn give_up(&mut self) -> Result<RoundResult, GameError> {
    self.touch();
    let result = self.round_mut()?.give_up()?;
    self.fold(&result);
    Ok(result)
  }

  /// Records a successful write. Later saves are refused by `is_saved`.
  pub fn mark_saved(&mut self, id: i64) {
    self.saved_id.get_or_insert(id);
  }

  /// Sets `end_time` (once) and builds the summary.
  pub fn finalize(&mut self) -> SessionSummary {
    let end_time = *self.end_time.get_or_insert_with(Utc::now);
    let rounds = self.history.clone();
    let played = rounds.len() as u32;
    let won = rounds.iter().filter(|r| r.correct).count() as u32;

    let (average_facts_used, average_time_secs) = if rounds.is_empty() {
      (0.0, 0.0)
    } else {
      let n = rounds.len() as f64;
      (
        rounds.iter().map(|r| r.facts_shown as f64).sum::<f64>() / n,
        rounds.iter().map(|r| r.time_taken_secs).sum::<f64>() / n,
      )
    };

    let summary = SessionSummary {
      session_key: self.key.clone(),
      id: self.saved_id,
      player_name: self.player_name.clone(),
      language: self.language,
      difficulty: self.difficulty.name.clone(),
      game_mode: self.mode,
      start_time: self.start_time,
      end_time,
      total_score: self.total_score,
      rounds_played: played,
      rounds_won: won,
      rounds_lost: played - won,
      average_facts_used,
      average_time_secs,
      best_round_score: rounds.iter().map(|r| r.round_score).max().unwrap_or(0),
      grade: self.settings.scoring.grade_session(&rounds),
      achievements: self.settings.scoring.achievements(&rounds),
      rounds,
    };
    info!(
      target: "session",
      session = %self.key,
      total_score = summary.total_score,
      rounds = played,
      won,
      grade = %summary.grade,
      "Session finalized"
    );
    summary
  }

  fn round_mut(&mut self) -> Result<&mut Round, GameError> {
    self.current.as_mut().ok_or(GameError::NoActiveRound)
  }

  fn fold(&mut self, result: &RoundResult) {
    self.rounds_completed += 1;
    self.total_score += u64::from(result.round_score);
    let record = self.current.as_ref().and_then(|r| r.record(&self.key, &self.player_name));
    if let Some(record) = record {
      self.history.push(record);
    }
    debug!(
      target: "session",
      session = %self.key,
      rounds_completed = self.rounds_completed,
      total_score = self.total_score,
      "Round folded into session"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::RoundOutcome;
  use crate::round::tests::{difficulty, item};

  fn session(max_rounds: Option<u32>) -> GameSession {
    GameSession::new("Ada", Language::En, max_rounds, difficulty(1.0), GameMode::Online, RoundSettings::default())
  }

  fn win_round(s: &mut GameSession, name: &str) -> RoundResult {
    s.start_round("places", None, item(name)).unwrap();
    s.reveal_fact().unwrap();
    match s.submit_guess(name).unwrap() {
      GuessOutcome::Finished(r) => r,
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn operations_need_an_active_round() {
    let mut s = session(None);
    assert_eq!(s.reveal_fact().unwrap_err(), GameError::NoActiveRound);
    assert_eq!(s.submit_guess("x").unwrap_err(), GameError::NoActiveRound);
    assert_eq!(s.request_hint().unwrap_err(), GameError::NoActiveRound);
    assert_eq!(s.give_up().unwrap_err(), GameError::NoActiveRound);
  }

  #[test]
  fn pending_round_blocks_a_new_one() {
    let mut s = session(None);
    s.start_round("places", None, item("Paris")).unwrap();
    assert_eq!(s.start_round("places", None, item("Rome")).unwrap_err(), GameError::RoundInProgress);
    s.give_up().unwrap();
    assert!(s.start_round("places", None, item("Rome")).is_ok());
  }

  #[test]
  fn totals_equal_sum_of_round_scores() {
    let mut s = session(None);
    let a = win_round(&mut s, "Paris");
    s.start_round("places", None, item("Rome")).unwrap();
    s.give_up().unwrap();
    let b = win_round(&mut s, "Oslo");

    assert_eq!(s.rounds_completed(), 3);
    assert_eq!(s.total_score(), u64::from(a.round_score + b.round_score));
    let from_history: u64 = s.history().iter().map(|r| u64::from(r.round_score)).sum();
    assert_eq!(s.total_score(), from_history);
    assert_eq!(s.last_record().unwrap().item_name, "Oslo");
  }

  #[test]
  fn auto_reveal_counts_as_completed_round() {
    let mut s = session(Some(1));
    s.start_round("places", None, item("Paris")).unwrap();
    for _ in 0..3 {
      s.submit_guess("zzz").unwrap();
    }
    assert_eq!(s.current_round().unwrap().outcome(), RoundOutcome::AutoRevealed);
    assert_eq!(s.rounds_completed(), 1);
    assert!(s.is_game_complete());
    assert_eq!(s.start_round("places", None, item("Rome")).unwrap_err(), GameError::SessionComplete);
  }

  #[test]
  fn finalize_builds_summary_and_saves_once() {
    let mut s = session(Some(2));
    win_round(&mut s, "Paris");
    s.start_round("places", None, item("Rome")).unwrap();
    s.give_up().unwrap();

    let summary = s.finalize();
    assert_eq!(summary.rounds_played, 2);
    assert_eq!(summary.rounds_won, 1);
    assert_eq!(summary.rounds_lost, 1);
    assert_eq!(summary.average_facts_used, 0.5);
    assert_eq!(summary.total_score, s.total_score());
    assert_eq!(summary.rounds.len(), 2);

    let again = s.finalize();
    assert_eq!(summary.end_time, again.end_time);

    assert!(!s.is_saved());
    s.mark_saved(7);
    s.mark_saved(8);
    assert!(s.is_saved());
    assert_eq!(s.finalize().id, Some(7));
    assert_eq!(s.start_round("places", None, item("Oslo")).unwrap_err(), GameError::SessionComplete);
  }

  #[test]
  fn three_round_cap_completes_after_the_third() {
    let mut s = session(Some(3));
    win_round(&mut s, "Paris");
    assert!(!s.is_game_complete());
    s.start_round("places", None, item("Rome")).unwrap();
    s.give_up().unwrap();
    assert!(!s.is_game_complete());
    win_round(&mut s, "Oslo");

    assert_eq!(s.rounds_completed(), 3);
    assert!(s.is_game_complete());
    assert_eq!(s.start_round("places", None, item("Bern")).unwrap_err(), GameError::SessionComplete);
    assert_eq!(s.rounds_completed(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn player_actions_reset_idle_time() {
    let mut s = session(None);
    tokio::time::advance(Duration::from_secs(90)).await;
    assert_eq!(s.idle_for(Instant::now()), Duration::from_secs(90));

    s.start_round("places", None, item("Paris")).unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;
    s.reveal_fact().unwrap();
    assert_eq!(s.idle_for(Instant::now()), Duration::ZERO);
  }

  #[test]
  fn blank_player_name_becomes_anonymous() {
    let s = GameSession::new("  ", Language::Pl, Some(0), difficulty(1.0), GameMode::Offline, RoundSettings::default());
    assert_eq!(s.player_name(), "Anonymous");
    assert_eq!(s.max_rounds(), None);
  }
}
