//! Loading game configuration from TOML.
//!
//! Two files:
//!   - `CATEGORIES_PATH` (default `config/categories.toml`): required. The game
//!     cannot run without categories, so every failure here is fatal.
//!   - `GAME_CONFIG_PATH` (default `config/game.toml`): optional rules, sourcing
//!     knobs, session eviction, the database path, prompts, difficulty levels
//!     and an item bank. Missing or broken files fall back to built-in defaults.
//!
//! `DATABASE_PATH` overrides `[store] database_path`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Category, DifficultyLevel, LocalizedText};
use crate::error::ConfigError;
use crate::locale::Language;
use crate::matcher::{AnswerMatcher, DEFAULT_SIMILARITY_THRESHOLD};
use crate::round::RoundSettings;
use crate::scoring::ScoringSystem;
use crate::seeds::default_difficulty_levels;

pub const DEFAULT_CATEGORIES_PATH: &str = "config/categories.toml";
pub const DEFAULT_GAME_CONFIG_PATH: &str = "config/game.toml";
pub const DEFAULT_DATABASE_PATH: &str = "data/guessr.db";

/// Everything read from disk at startup.
#[derive(Clone, Debug)]
pub struct GameConfig {
  pub categories: Vec<Category>,
  pub settings: GameSettings,
}

#[derive(Debug, Deserialize, Default)]
struct CategoriesFile {
  #[serde(default)]
  categories: Vec<Category>,
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct GameSettings {
  pub rules: Rules,
  pub sourcing: SourcingSettings,
  pub sessions: SessionSettings,
  pub store: StoreSettings,
  pub prompts: Prompts,
  pub difficulty_levels: BTreeMap<String, DifficultyCfg>,
  pub items: Vec<BankItem>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rules {
  pub similarity_threshold: f64,
  pub max_failed_attempts: u32,
  pub max_hints: u32,
}

impl Default for Rules {
  fn default() -> Self {
    Self {
      similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
      max_failed_attempts: crate::round::DEFAULT_MAX_FAILED_ATTEMPTS,
      max_hints: crate::hint::DEFAULT_MAX_HINTS,
    }
  }
}

/// Knobs of the content sourcing policy.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SourcingSettings {
  pub max_attempts: u32,
  /// How many avoid-list names go into one prompt.
  pub avoid_list_prompt_len: usize,
  pub duplicate_window_hours: u32,
  pub avoid_window_hours: u32,
  pub avoid_list_limit: usize,
  pub generation_timeout_secs: u64,
  pub base_temperature: f32,
  pub temperature_step: f32,
  /// How long round start waits for the generated item to be saved. The save
  /// itself keeps running in the background after this.
  pub save_timeout_ms: u64,
}

impl Default for SourcingSettings {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      avoid_list_prompt_len: 15,
      duplicate_window_hours: 72,
      avoid_window_hours: 48,
      avoid_list_limit: 30,
      generation_timeout_secs: 30,
      base_temperature: 0.9,
      temperature_step: 0.1,
      save_timeout_ms: 2000,
    }
  }
}

impl SourcingSettings {
  pub fn generation_timeout(&self) -> Duration {
    Duration::from_secs(self.generation_timeout_secs)
  }

  pub fn save_timeout(&self) -> Duration {
    Duration::from_millis(self.save_timeout_ms)
  }

  /// Escalates by `temperature_step` per attempt, capped at 1.0.
  pub fn temperature(&self, attempt: u32) -> f32 {
    (self.base_temperature + self.temperature_step * attempt as f32).min(1.0)
  }
}

/// Eviction of abandoned sessions.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
  pub idle_timeout_secs: u64,
  pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self { idle_timeout_secs: 1800, sweep_interval_secs: 60 }
  }
}

impl SessionSettings {
  pub fn idle_timeout(&self) -> Duration {
    Duration::from_secs(self.idle_timeout_secs)
  }

  /// Never zero; `tokio::time::interval` panics on a zero period.
  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
  pub database_path: PathBuf,
}

impl Default for StoreSettings {
  fn default() -> Self {
    Self { database_path: PathBuf::from(DEFAULT_DATABASE_PATH) }
  }
}

/// Prompts used by the generator. Placeholders are filled with `util::fill_template`.
///
/// `generation_user_template` placeholders: `{category}`, `{subcategory}` (a
/// clause, empty when no subcategory was picked), `{language}`,
/// `{difficulty_hint}`, `{avoid}` and `{retry}` (filled from the two section
/// templates, or empty).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub generation_user_template: String,
  pub subcategory_template: String,
  pub avoid_template: String,
  pub retry_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are a creative assistant that generates unique and engaging guessing game content. Always prioritize originality and avoid repetition. Respond ONLY with strict JSON.".into(),
      generation_user_template: r#"Generate a random object, person, place, or concept from the category of {category}{subcategory} for a guessing game. Write the name and all facts in {language}.

Respond with a JSON object in this exact format:
{"name": "ItemName", "facts": ["Fact 1 (start with 'I am' or 'I have')", "Fact 2", "Fact 3", "Fact 4", "Fact 5 (most specific/identifying)"]}

Rules:
- Exactly 5 facts, progressively more specific and identifying
- Start facts in the first person ("I am", "I have", "I live", ...)
- Each fact is a single sentence
- Make it challenging but fair; the final fact makes the answer very clear
- BE CREATIVE AND UNIQUE, avoid common or obvious choices

Difficulty guideline: {difficulty_hint}{avoid}{retry}"#.into(),
      subcategory_template: " (specifically related to {subcategory})".into(),
      avoid_template: "\n\nIMPORTANT: Do NOT generate any of these recently used items: {items}\nChoose something completely different, unique, and creative.".into(),
      retry_template: "\n\nATTEMPT {attempt}: This is a retry. Please be even MORE creative and unique. Avoid obvious choices!".into(),
    }
  }
}

/// Difficulty level as written in TOML; the table key is the level name.
#[derive(Clone, Debug, Deserialize)]
pub struct DifficultyCfg {
  pub score_multiplier: f64,
  #[serde(default)]
  pub hint_penalty: u32,
  #[serde(default)]
  pub prompt_hint: String,
  #[serde(default)]
  pub display: std::collections::HashMap<String, LocalizedText>,
}

/// Pre-written item loaded into the store at startup.
#[derive(Clone, Debug, Deserialize)]
pub struct BankItem {
  pub name: String,
  pub category: String,
  #[serde(default)]
  pub subcategory: Option<String>,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub language: Language,
  pub facts: Vec<String>,
}

impl GameSettings {
  pub fn round_settings(&self) -> RoundSettings {
    RoundSettings {
      matcher: AnswerMatcher::new(self.rules.similarity_threshold),
      scoring: ScoringSystem::default(),
      max_failed_attempts: self.rules.max_failed_attempts.max(1),
      max_hints: self.rules.max_hints,
    }
  }

  /// Configured levels, or the built-in five when none are configured.
  pub fn difficulty_levels(&self) -> Vec<DifficultyLevel> {
    if self.difficulty_levels.is_empty() {
      return default_difficulty_levels();
    }
    self
      .difficulty_levels
      .iter()
      .map(|(name, cfg)| DifficultyLevel {
        name: name.clone(),
        score_multiplier: cfg.score_multiplier,
        hint_penalty: cfg.hint_penalty,
        prompt_hint: cfg.prompt_hint.clone(),
        display: cfg.display.clone(),
      })
      .collect()
  }
}

pub fn parse_categories(text: &str, path: &Path) -> Result<Vec<Category>, ConfigError> {
  let file: CategoriesFile = toml::from_str(text)
    .map_err(|source| ConfigError::CategoriesInvalid { path: path.to_path_buf(), source })?;
  if file.categories.is_empty() {
    return Err(ConfigError::CategoriesEmpty { path: path.to_path_buf() });
  }
  Ok(file.categories)
}

pub fn load_categories(path: &Path) -> Result<Vec<Category>, ConfigError> {
  let text = std::fs::read_to_string(path)
    .map_err(|source| ConfigError::CategoriesUnreadable { path: path.to_path_buf(), source })?;
  let categories = parse_categories(&text, path)?;
  info!(target: "guessr_backend", path = %path.display(), count = categories.len(), "Loaded categories");
  Ok(categories)
}

/// Never fails: a missing or broken file yields the defaults.
pub fn load_game_settings(path: &Path) -> GameSettings {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<GameSettings>(&s) {
      Ok(cfg) => {
        info!(target: "guessr_backend", path = %path.display(), items = cfg.items.len(), "Loaded game config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "guessr_backend", path = %path.display(), error = %e, "Failed to parse game config; using defaults");
        GameSettings::default()
      }
    },
    Err(e) => {
      info!(target: "guessr_backend", path = %path.display(), error = %e, "No game config file; using defaults");
      GameSettings::default()
    }
  }
}

fn env_path(var: &str, default: &str) -> PathBuf {
  std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

pub fn load_from_env() -> Result<GameConfig, ConfigError> {
  let categories = load_categories(&env_path("CATEGORIES_PATH", DEFAULT_CATEGORIES_PATH))?;
  let mut settings = load_game_settings(&env_path("GAME_CONFIG_PATH", DEFAULT_GAME_CONFIG_PATH));
  if let Ok(path) = std::env::var("DATABASE_PATH") {
    settings.store.database_path = PathBuf::from(path);
  }
  Ok(GameConfig { categories, settings })
}
