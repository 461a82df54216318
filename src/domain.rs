//! Domain models used by the backend: items and where they came from, match
//! types, round outcomes, difficulty levels, categories and round history records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::locale::Language;

/// Where did we get the item from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
  Generated, // fresh from the generator
  Store,     // store fallback after generation failed
  Offline,   // offline mode, store only
  Error,     // placeholder; not playable
}

/// The secret answer for a round. Immutable once assigned to a round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
  pub name: String,
  pub facts: Vec<String>,
  #[serde(default)]
  pub question_id: Option<i64>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub subcategory: Option<String>,
  pub source: ItemSource,
}

impl Item {
  /// Error placeholders carry explanatory facts, never a playable answer.
  pub fn is_error(&self) -> bool {
    self.source == ItemSource::Error
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
  Exact,
  Similar,
  Different,
  Invalid,
  GaveUp,
}

impl MatchType {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Exact => "exact",
      Self::Similar => "similar",
      Self::Different => "different",
      Self::Invalid => "invalid",
      Self::GaveUp => "gave_up",
    }
  }
}

/// Round lifecycle. `Pending` is the only non-terminal state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
  #[default]
  Pending,
  Correct,
  AutoRevealed,
  GaveUp,
}

impl RoundOutcome {
  pub const fn is_terminal(&self) -> bool {
    !matches!(self, Self::Pending)
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
  #[default]
  Online,
  Offline,
}

impl GameMode {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Online => "online",
      Self::Offline => "offline",
    }
  }

  /// Anything but "offline" reads as online.
  pub fn from_code(code: &str) -> Self {
    if code.eq_ignore_ascii_case("offline") {
      Self::Offline
    } else {
      Self::Online
    }
  }
}

/// Display strings for one language.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocalizedText {
  pub name: String,
  #[serde(default)]
  pub description: String,
}

/// Immutable difficulty configuration, loaded once at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DifficultyLevel {
  pub name: String,
  pub score_multiplier: f64,
  /// Per-hint penalty reported alongside hints. Display only.
  #[serde(default)]
  pub hint_penalty: u32,
  #[serde(default)]
  pub prompt_hint: String,
  /// Keyed by language code ("en", "pl").
  #[serde(default)]
  pub display: HashMap<String, LocalizedText>,
}

impl DifficultyLevel {
  pub fn display_name(&self, lang: Language) -> String {
    self
      .display
      .get(lang.code())
      .map(|t| t.name.clone())
      .unwrap_or_else(|| title_case(&self.name.replace('_', " ")))
  }

  pub fn description(&self, lang: Language) -> String {
    self
      .display
      .get(lang.code())
      .or_else(|| self.display.get(Language::En.code()))
      .map(|t| t.description.clone())
      .unwrap_or_default()
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CategoryTranslation {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub examples: Vec<String>,
}

/// Immutable category configuration record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Example subcategories, used as generation hints.
  #[serde(default)]
  pub examples: Vec<String>,
  /// Keyed by language code.
  #[serde(default)]
  pub translations: HashMap<String, CategoryTranslation>,
}

impl Category {
  pub fn display_name(&self, lang: Language) -> &str {
    self.translations.get(lang.code()).map(|t| t.name.as_str()).unwrap_or(&self.name)
  }

  pub fn display_description(&self, lang: Language) -> &str {
    self
      .translations
      .get(lang.code())
      .map(|t| t.description.as_str())
      .filter(|d| !d.is_empty())
      .unwrap_or(&self.description)
  }

  /// Localized subcategory example; falls back to the English one at the same position.
  pub fn localized_example(&self, english: &str, lang: Language) -> String {
    let Some(tr) = self.translations.get(lang.code()) else {
      return english.to_string();
    };
    self
      .examples
      .iter()
      .position(|e| e == english)
      .and_then(|i| tr.examples.get(i))
      .cloned()
      .unwrap_or_else(|| english.to_string())
  }
}

/// Immutable history entry for a finished round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundRecord {
  pub session_key: String,
  pub player_name: String,
  pub item_name: String,
  pub category: String,
  pub subcategory: Option<String>,
  pub difficulty: String,
  pub language: Language,
  pub question_id: Option<i64>,
  pub facts_shown: u32,
  pub total_facts: u32,
  pub hints_used: u32,
  pub max_hints: u32,
  pub correct: bool,
  pub guesses: Vec<String>,
  /// Wrong guesses (all guesses on a loss, all but the winning one on a win).
  pub guess_attempts: u32,
  pub final_guess: Option<String>,
  pub similarity_score: f64,
  pub match_type: MatchType,
  pub time_taken_secs: f64,
  pub round_score: u32,
  pub base_score: u32,
  pub score_multiplier: f64,
  pub gave_up: bool,
  pub auto_revealed: bool,
  pub game_mode: GameMode,
}

fn title_case(s: &str) -> String {
  s.split(' ')
    .map(|w| {
      let mut chars = w.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}
