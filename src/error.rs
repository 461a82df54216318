//! Error taxonomy for the game engine and its collaborators.
//!
//! - `GameError`: invalid input or invalid state for a round/session operation.
//!   Always recoverable; rendered to the player as a localized message.
//! - `GenerationError`: the item generator failed. Retried or degraded by sourcing.
//! - `StoreError`: the persisted store failed. Never escapes the engine.
//! - `SourcingError`: offline-mode conditions the caller must react to.
//! - `EngineError`: the union a request-level operation hands to the transport.
//! - `ConfigError`: startup configuration that the process cannot run without.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
  #[error("guess is empty")]
  InvalidGuess,
  #[error("round is already over")]
  RoundOver,
  #[error("no more facts available")]
  NoMoreFacts,
  #[error("all hints used for this round")]
  HintsExhausted,
  #[error("no more letters to reveal")]
  NoLettersLeft,
  #[error("no active round")]
  NoActiveRound,
  #[error("a round is already in progress")]
  RoundInProgress,
  #[error("game session is already complete")]
  SessionComplete,
  #[error("no active game session")]
  SessionNotFound,
  #[error("unknown category: {0}")]
  UnknownCategory(String),
}

impl GameError {
  /// Stable machine-readable code used in API payloads.
  pub const fn code(&self) -> &'static str {
    match self {
      Self::InvalidGuess => "invalid_guess",
      Self::RoundOver => "round_over",
      Self::NoMoreFacts => "no_more_facts",
      Self::HintsExhausted => "hints_exhausted",
      Self::NoLettersLeft => "no_letters_left",
      Self::NoActiveRound => "no_active_round",
      Self::RoundInProgress => "round_in_progress",
      Self::SessionComplete => "session_complete",
      Self::SessionNotFound => "session_not_found",
      Self::UnknownCategory(_) => "unknown_category",
    }
  }
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
  #[error("no generator client configured")]
  NoClient,
  #[error("generation timed out after {0:?}")]
  Timeout(Duration),
  #[error("generator request failed: {0}")]
  Request(String),
  #[error("malformed generator response: {0}")]
  Malformed(String),
}

impl GenerationError {
  /// Malformed payloads and timeouts are worth another attempt; anything else is not.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Malformed(_) | Self::Timeout(_))
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store unavailable")]
  Unavailable,
  #[error("store backend error: {0}")]
  Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcingError {
  #[error("no offline content matches the selected filters")]
  NoOfflineContent { available: u64 },
  #[error("offline content could not be retrieved ({available} matching)")]
  OfflineFetchFailed { available: u64 },
}

/// What a request-level engine operation can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
  #[error(transparent)]
  Game(#[from] GameError),
  #[error(transparent)]
  Sourcing(#[from] SourcingError),
  /// Sourcing ended on the error placeholder; nothing playable to start.
  #[error("no playable content could be sourced")]
  ContentUnavailable,
}

impl EngineError {
  pub const fn code(&self) -> &'static str {
    match self {
      Self::Game(e) => e.code(),
      Self::Sourcing(SourcingError::NoOfflineContent { .. }) => "no_offline_content",
      Self::Sourcing(SourcingError::OfflineFetchFailed { .. }) => "offline_fetch_failed",
      Self::ContentUnavailable => "content_error",
    }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("categories file {} could not be read: {source}", path.display())]
  CategoriesUnreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("categories file {} is invalid: {source}", path.display())]
  CategoriesInvalid {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("categories file {} defines no categories", path.display())]
  CategoriesEmpty { path: PathBuf },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retryable_classification() {
    assert!(GenerationError::Malformed("x".into()).is_retryable());
    assert!(GenerationError::Timeout(Duration::from_secs(30)).is_retryable());
    assert!(!GenerationError::NoClient.is_retryable());
    assert!(!GenerationError::Request("503".into()).is_retryable());
  }

  #[test]
  fn codes_are_stable() {
    assert_eq!(GameError::InvalidGuess.code(), "invalid_guess");
    assert_eq!(GameError::UnknownCategory("x".into()).code(), "unknown_category");
    assert_eq!(EngineError::from(GameError::SessionNotFound).code(), "session_not_found");
    assert_eq!(
      EngineError::from(SourcingError::NoOfflineContent { available: 0 }).code(),
      "no_offline_content"
    );
    assert_eq!(EngineError::ContentUnavailable.code(), "content_error");
  }
}
