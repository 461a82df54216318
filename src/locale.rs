//! User-facing text, keyed by language.
//!
//! Nothing in the engine reads a global "current language": every call that
//! produces text receives a `Locale` explicitly. Matching and scoring never
//! look at text produced here.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, GameError, SourcingError};
use crate::matcher::FeedbackTier;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
  #[default]
  En,
  Pl,
}

impl Language {
  pub const ALL: [Language; 2] = [Language::En, Language::Pl];

  /// Lenient parse: unknown or missing codes fall back to English.
  pub fn from_code(code: &str) -> Self {
    match code.trim().to_ascii_lowercase().as_str() {
      "pl" | "pl-pl" | "polish" => Language::Pl,
      _ => Language::En,
    }
  }

  pub const fn code(self) -> &'static str {
    match self {
      Language::En => "en",
      Language::Pl => "pl",
    }
  }

  pub const fn native_name(self) -> &'static str {
    match self {
      Language::En => "English",
      Language::Pl => "Polski",
    }
  }

  /// Name used inside generation prompts.
  pub const fn english_name(self) -> &'static str {
    match self {
      Language::En => "English",
      Language::Pl => "Polish",
    }
  }

  pub fn locale(self) -> Locale {
    Locale(self)
  }
}

/// Text catalogue for one language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Locale(pub Language);

impl Locale {
  pub fn language(&self) -> Language {
    self.0
  }

  pub fn feedback(&self, tier: FeedbackTier, similarity: f64) -> String {
    let pct = similarity * 100.0;
    match (self.0, tier) {
      (Language::En, FeedbackTier::Exact) => "Correct! Perfect match!".into(),
      (Language::En, FeedbackTier::Similar) => format!("Correct! Close enough! ({pct:.1}% similar)"),
      (Language::En, FeedbackTier::VeryClose) => format!("Very close! ({pct:.1}% similar) - Try again!"),
      (Language::En, FeedbackTier::Warmer) => format!("Getting warmer! ({pct:.1}% similar) - Keep trying!"),
      (Language::En, FeedbackTier::Miss) => "Not quite right - Try again!".into(),
      (Language::Pl, FeedbackTier::Exact) => "Poprawnie! Idealne dopasowanie!".into(),
      (Language::Pl, FeedbackTier::Similar) => format!("Poprawnie! Wystarczająco blisko! ({pct:.1}% podobne)"),
      (Language::Pl, FeedbackTier::VeryClose) => format!("Bardzo blisko! ({pct:.1}% podobne) - Spróbuj ponownie!"),
      (Language::Pl, FeedbackTier::Warmer) => format!("Robi się cieplej! ({pct:.1}% podobne) - Próbuj dalej!"),
      (Language::Pl, FeedbackTier::Miss) => "Nie całkiem - Spróbuj ponownie!".into(),
    }
  }

  pub fn attempts_remaining(&self, remaining: u32) -> String {
    match self.0 {
      Language::En => format!(" (Attempts remaining: {remaining})"),
      Language::Pl => format!(" (Pozostało prób: {remaining})"),
    }
  }

  pub fn auto_revealed(&self, max_failed_attempts: u32) -> String {
    match self.0 {
      Language::En => format!("Answer revealed after {max_failed_attempts} failed attempts!"),
      Language::Pl => format!("Odpowiedź została ujawniona po {max_failed_attempts} nieudanych próbach!"),
    }
  }

  pub fn gave_up(&self) -> String {
    match self.0 {
      Language::En => "You gave up this round".into(),
      Language::Pl => "Poddałeś tę rundę".into(),
    }
  }

  pub fn letter_revealed(&self, hints_remaining: u32) -> String {
    match self.0 {
      Language::En => format!("Letter revealed! Hints remaining: {hints_remaining}"),
      Language::Pl => format!("Ujawniono literę! Pozostałe podpowiedzi: {hints_remaining}"),
    }
  }

  pub fn session_ended(&self) -> String {
    match self.0 {
      Language::En => "Session ended successfully".into(),
      Language::Pl => "Sesja zakończona pomyślnie".into(),
    }
  }

  pub fn no_offline_content(&self) -> String {
    match self.0 {
      Language::En => {
        "No questions found in the database for the selected criteria. Please try online mode or different settings.".into()
      }
      Language::Pl => {
        "Brak pytań w bazie dla wybranych kryteriów. Spróbuj trybu online lub innych ustawień.".into()
      }
    }
  }

  pub fn offline_fetch_failed(&self) -> String {
    match self.0 {
      Language::En => "Unable to retrieve a question from the database.".into(),
      Language::Pl => "Nie udało się pobrać pytania z bazy.".into(),
    }
  }

  pub fn content_error(&self) -> String {
    match self.0 {
      Language::En => "Failed to generate game content".into(),
      Language::Pl => "Nie udało się wygenerować zawartości gry".into(),
    }
  }

  /// Name and facts of the placeholder item returned when no content could be sourced.
  pub fn generation_error_item(&self) -> (String, Vec<String>) {
    match self.0 {
      Language::En => (
        "Generation Error".into(),
        vec![
          "There was a problem generating a question.".into(),
          "Please try again or select a different category.".into(),
          "The system cannot currently generate a new question.".into(),
        ],
      ),
      Language::Pl => (
        "Błąd generowania".into(),
        vec![
          "Wystąpił problem z generowaniem pytania.".into(),
          "Spróbuj ponownie lub wybierz inną kategorię.".into(),
          "System nie może obecnie wygenerować nowego pytania.".into(),
        ],
      ),
    }
  }

  pub fn engine_error(&self, err: &EngineError) -> String {
    match err {
      EngineError::Game(e) => self.game_error(e),
      EngineError::Sourcing(SourcingError::NoOfflineContent { .. }) => self.no_offline_content(),
      EngineError::Sourcing(SourcingError::OfflineFetchFailed { .. }) => self.offline_fetch_failed(),
      EngineError::ContentUnavailable => self.content_error(),
    }
  }

  pub fn game_error(&self, err: &GameError) -> String {
    match (self.0, err) {
      (Language::En, GameError::InvalidGuess) => "Please enter a valid guess".into(),
      (Language::En, GameError::RoundOver) => "This round is already over".into(),
      (Language::En, GameError::NoMoreFacts) => "No more facts available".into(),
      (Language::En, GameError::HintsExhausted) => "All hints used for this round".into(),
      (Language::En, GameError::NoLettersLeft) => "No more letters to reveal".into(),
      (Language::En, GameError::NoActiveRound) => "No active round".into(),
      (Language::En, GameError::RoundInProgress) => "Finish or give up the current round first".into(),
      (Language::En, GameError::SessionComplete) => "Game session is already complete".into(),
      (Language::En, GameError::SessionNotFound) => "No active game session".into(),
      (Language::En, GameError::UnknownCategory(name)) => format!("Unknown category: {name}"),
      (Language::Pl, GameError::InvalidGuess) => "Wpisz poprawną odpowiedź".into(),
      (Language::Pl, GameError::RoundOver) => "Ta runda już się zakończyła".into(),
      (Language::Pl, GameError::NoMoreFacts) => "Brak kolejnych faktów".into(),
      (Language::Pl, GameError::HintsExhausted) => "Wykorzystano wszystkie podpowiedzi dla tej rundy".into(),
      (Language::Pl, GameError::NoLettersLeft) => "Nie ma więcej liter do ujawnienia".into(),
      (Language::Pl, GameError::NoActiveRound) => "Brak aktywnej rundy".into(),
      (Language::Pl, GameError::RoundInProgress) => "Najpierw dokończ lub poddaj bieżącą rundę".into(),
      (Language::Pl, GameError::SessionComplete) => "Sesja gry jest już zakończona".into(),
      (Language::Pl, GameError::SessionNotFound) => "Brak aktywnej sesji gry".into(),
      (Language::Pl, GameError::UnknownCategory(name)) => format!("Nieznana kategoria: {name}"),
    }
  }
}
