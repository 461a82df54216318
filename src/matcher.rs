//! Fuzzy answer matching.
//!
//! Both strings are trimmed and case-folded, then compared exactly and, failing
//! that, with Jaro-Winkler similarity. The matcher is a pure function of its
//! inputs and the configured threshold.

use serde::Serialize;

use crate::domain::MatchType;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;
/// Below-threshold similarity at or above this is "very close".
pub const VERY_CLOSE_TIER: f64 = 0.7;
/// Below-threshold similarity at or above this is "getting warmer".
pub const WARMER_TIER: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult {
  pub correct: bool,
  pub similarity: f64,
  pub match_type: MatchType,
}

/// Feedback bucket for a guess; the text itself is a `Locale` concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackTier {
  Exact,
  Similar,
  VeryClose,
  Warmer,
  Miss,
}

#[derive(Clone, Copy, Debug)]
pub struct AnswerMatcher {
  threshold: f64,
}

impl Default for AnswerMatcher {
  fn default() -> Self {
    Self { threshold: DEFAULT_SIMILARITY_THRESHOLD }
  }
}

impl AnswerMatcher {
  pub fn new(threshold: f64) -> Self {
    Self { threshold: threshold.clamp(0.0, 1.0) }
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn evaluate(&self, guess: &str, answer: &str) -> MatchResult {
    let guess = normalize(guess);
    let answer = normalize(answer);

    if guess.is_empty() || answer.is_empty() {
      return MatchResult { correct: false, similarity: 0.0, match_type: MatchType::Invalid };
    }
    if guess == answer {
      return MatchResult { correct: true, similarity: 1.0, match_type: MatchType::Exact };
    }

    let similarity = strsim::jaro_winkler(&guess, &answer);
    if similarity >= self.threshold {
      MatchResult { correct: true, similarity, match_type: MatchType::Similar }
    } else {
      MatchResult { correct: false, similarity, match_type: MatchType::Different }
    }
  }
}

impl MatchResult {
  pub fn tier(&self) -> FeedbackTier {
    match self.match_type {
      MatchType::Exact => FeedbackTier::Exact,
      MatchType::Similar => FeedbackTier::Similar,
      _ => tier_for_similarity(self.similarity),
    }
  }
}

pub fn tier_for_similarity(similarity: f64) -> FeedbackTier {
  if similarity >= VERY_CLOSE_TIER {
    FeedbackTier::VeryClose
  } else if similarity >= WARMER_TIER {
    FeedbackTier::Warmer
  } else {
    FeedbackTier::Miss
  }
}

fn normalize(s: &str) -> String {
  s.trim().to_lowercase()
}
