//! One guessing round: fact reveals, guesses, hints and termination.
//!
//! ```text
//!            reveal / hint / wrong guess (< cap)
//!               ┌──────────────┐
//!               ▼              │
//!   ──────► Pending ───────────┘
//!               │ correct guess        ──► Correct
//!               │ wrong guess (== cap) ──► AutoRevealed
//!               │ give up              ──► GaveUp
//! ```
//!
//! Terminal states are final: every mutating operation afterwards returns
//! `GameError::RoundOver` and leaves the round untouched.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::domain::{DifficultyLevel, GameMode, Item, MatchType, RoundOutcome, RoundRecord};
use crate::error::GameError;
use crate::hint::{HintReveal, HintTracker, DEFAULT_MAX_HINTS};
use crate::locale::Language;
use crate::matcher::{AnswerMatcher, FeedbackTier};
use crate::scoring::{ScoreInput, ScoringSystem};

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 3;

/// Rules shared by every round of a process.
#[derive(Clone, Copy, Debug)]
pub struct RoundSettings {
  pub matcher: AnswerMatcher,
  pub scoring: ScoringSystem,
  pub max_failed_attempts: u32,
  pub max_hints: u32,
}

impl Default for RoundSettings {
  fn default() -> Self {
    Self {
      matcher: AnswerMatcher::default(),
      scoring: ScoringSystem::default(),
      max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
      max_hints: DEFAULT_MAX_HINTS,
    }
  }
}

/// Everything needed to open a round.
#[derive(Clone, Debug)]
pub struct RoundSetup {
  pub category: String,
  pub subcategory: Option<String>,
  pub item: Item,
  pub difficulty: DifficultyLevel,
  pub language: Language,
  pub mode: GameMode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RevealedFact {
  pub text: String,
  pub number: u32,
  pub total: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GuessMiss {
  pub similarity: f64,
  pub tier: FeedbackTier,
  pub failed_attempts: u32,
  pub max_failed_attempts: u32,
  pub attempts_remaining: u32,
}

/// Terminal result package of a round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundResult {
  pub outcome: RoundOutcome,
  pub correct: bool,
  pub answer: String,
  pub similarity: f64,
  pub match_type: MatchType,
  pub tier: FeedbackTier,
  pub elapsed: Duration,
  pub facts_used: u32,
  pub base_score: u32,
  pub score_multiplier: f64,
  pub round_score: u32,
  pub auto_revealed: bool,
  pub gave_up: bool,
  pub failed_attempts: u32,
  pub max_failed_attempts: u32,
  pub hints_used: u32,
  pub hint_display: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GuessOutcome {
  Miss(GuessMiss),
  Finished(RoundResult),
}

#[derive(Clone, Debug)]
pub struct Round {
  category: String,
  subcategory: Option<String>,
  item: Item,
  difficulty: DifficultyLevel,
  language: Language,
  mode: GameMode,
  settings: RoundSettings,

  facts_shown: u32,
  guesses: Vec<String>,
  failed_attempts: u32,
  hints: HintTracker,
  outcome: RoundOutcome,
  started_at: Instant,
  result: Option<RoundResult>,
}

impl Round {
  pub fn new(setup: RoundSetup, settings: RoundSettings) -> Self {
    debug!(target: "round", item_len = setup.item.name.len(), facts = setup.item.facts.len(), category = %setup.category, "Round opened");
    Self {
      category: setup.category,
      subcategory: setup.subcategory,
      item: setup.item,
      difficulty: setup.difficulty,
      language: setup.language,
      mode: setup.mode,
      settings,
      facts_shown: 0,
      guesses: Vec::new(),
      failed_attempts: 0,
      hints: HintTracker::new(settings.max_hints),
      outcome: RoundOutcome::Pending,
      started_at: Instant::now(),
      result: None,
    }
  }

  #[cfg(test)]
  pub(crate) fn with_start(mut self, started_at: Instant) -> Self {
    self.started_at = started_at;
    self
  }

  pub fn category(&self) -> &str {
    &self.category
  }
  pub fn subcategory(&self) -> Option<&str> {
    self.subcategory.as_deref()
  }
  pub fn item(&self) -> &Item {
    &self.item
  }
  pub fn difficulty(&self) -> &DifficultyLevel {
    &self.difficulty
  }
  pub fn outcome(&self) -> RoundOutcome {
    self.outcome
  }
  pub fn is_finished(&self) -> bool {
    self.outcome.is_terminal()
  }
  pub fn facts_shown(&self) -> u32 {
    self.facts_shown
  }
  pub fn total_facts(&self) -> u32 {
    self.item.facts.len() as u32
  }
  pub fn guesses(&self) -> &[String] {
    &self.guesses
  }
  pub fn failed_attempts(&self) -> u32 {
    self.failed_attempts
  }
  pub fn hints(&self) -> &HintTracker {
    &self.hints
  }
  pub fn result(&self) -> Option<&RoundResult> {
    self.result.as_ref()
  }

  pub fn hint_display(&self) -> String {
    self.hints.current_display(&self.item.name)
  }

  pub fn reveal_next_fact(&mut self) -> Result<RevealedFact, GameError> {
    self.ensure_pending()?;
    let idx = self.facts_shown as usize;
    let text = self.item.facts.get(idx).cloned().ok_or(GameError::NoMoreFacts)?;
    self.facts_shown += 1;
    debug!(target: "round", fact = self.facts_shown, total = self.total_facts(), "Fact revealed");
    Ok(RevealedFact { text, number: self.facts_shown, total: self.total_facts() })
  }

  pub fn submit_guess(&mut self, text: &str) -> Result<GuessOutcome, GameError> {
    self.ensure_pending()?;
    let guess = text.trim();
    if guess.is_empty() {
      return Err(GameError::InvalidGuess);
    }
    self.guesses.push(guess.to_string());

    let m = self.settings.matcher.evaluate(guess, &self.item.name);
    if m.correct {
      return Ok(GuessOutcome::Finished(self.finish(RoundOutcome::Correct, m.similarity, m.match_type)));
    }

    self.failed_attempts += 1;
    if self.failed_attempts >= self.settings.max_failed_attempts {
      return Ok(GuessOutcome::Finished(self.finish(RoundOutcome::AutoRevealed, m.similarity, m.match_type)));
    }

    debug!(target: "round", failed = self.failed_attempts, similarity = m.similarity, "Wrong guess");
    Ok(GuessOutcome::Miss(GuessMiss {
      similarity: m.similarity,
      tier: m.tier(),
      failed_attempts: self.failed_attempts,
      max_failed_attempts: self.settings.max_failed_attempts,
      attempts_remaining: self.settings.max_failed_attempts - self.failed_attempts,
    }))
  }

  pub fn give_up(&mut self) -> Result<RoundResult, GameError> {
    self.ensure_pending()?;
    Ok(self.finish(RoundOutcome::GaveUp, 0.0, MatchType::GaveUp))
  }

  pub fn request_hint(&mut self) -> Result<HintReveal, GameError> {
    self.ensure_pending()?;
    self.hints.reveal(&self.item.name)
  }

  /// Immutable history entry; `None` while the round is still pending.
  pub fn record(&self, session_key: &str, player_name: &str) -> Option<RoundRecord> {
    let r = self.result.as_ref()?;
    Some(RoundRecord {
      session_key: session_key.to_string(),
      player_name: player_name.to_string(),
      item_name: self.item.name.clone(),
      category: self.category.clone(),
      subcategory: self.subcategory.clone(),
      difficulty: self.difficulty.name.clone(),
      language: self.language,
      question_id: self.item.question_id,
      facts_shown: self.facts_shown,
      total_facts: self.total_facts(),
      hints_used: self.hints.hints_used(),
      max_hints: self.hints.max_hints(),
      correct: r.correct,
      guesses: self.guesses.clone(),
      guess_attempts: self.wrong_guesses(r.correct),
      final_guess: self.guesses.last().cloned(),
      similarity_score: r.similarity,
      match_type: r.match_type,
      time_taken_secs: r.elapsed.as_secs_f64(),
      round_score: r.round_score,
      base_score: r.base_score,
      score_multiplier: r.score_multiplier,
      gave_up: r.gave_up,
      auto_revealed: r.auto_revealed,
      game_mode: self.mode,
    })
  }

  fn ensure_pending(&self) -> Result<(), GameError> {
    if self.outcome.is_terminal() {
      Err(GameError::RoundOver)
    } else {
      Ok(())
    }
  }

  fn wrong_guesses(&self, correct: bool) -> u32 {
    let n = self.guesses.len() as u32;
    if correct {
      n.saturating_sub(1)
    } else {
      n
    }
  }

  fn finish(&mut self, outcome: RoundOutcome, similarity: f64, match_type: MatchType) -> RoundResult {
    let elapsed = self.started_at.elapsed();
    let correct = outcome == RoundOutcome::Correct;
    let multiplier = self.difficulty.score_multiplier;

    let (base_score, round_score) = if correct {
      let input = ScoreInput {
        facts_shown: self.facts_shown,
        wrong_guesses: self.wrong_guesses(true),
        match_type,
        elapsed,
      };
      let s = self.settings.scoring.score_round(&input, multiplier);
      (s.base, s.total)
    } else {
      (0, 0)
    };

    let tier = match outcome {
      RoundOutcome::Correct if match_type == MatchType::Exact => FeedbackTier::Exact,
      RoundOutcome::Correct => FeedbackTier::Similar,
      _ => crate::matcher::tier_for_similarity(similarity),
    };

    self.outcome = outcome;
    let result = RoundResult {
      outcome,
      correct,
      answer: self.item.name.clone(),
      similarity,
      match_type,
      tier,
      elapsed,
      facts_used: self.facts_shown,
      base_score,
      score_multiplier: multiplier,
      round_score,
      auto_revealed: outcome != RoundOutcome::Correct,
      gave_up: outcome == RoundOutcome::GaveUp,
      failed_attempts: self.failed_attempts,
      max_failed_attempts: self.settings.max_failed_attempts,
      hints_used: self.hints.hints_used(),
      hint_display: self.hint_display(),
    };
    info!(
      target: "round",
      outcome = ?outcome,
      score = round_score,
      facts = self.facts_shown,
      guesses = self.guesses.len(),
      elapsed_ms = elapsed.as_millis() as u64,
      "Round finished"
    );
    self.result = Some(result.clone());
    result
  }
}
