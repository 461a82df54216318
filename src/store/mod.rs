//! Persisted store: generated items, played rounds and finished sessions.
//!
//! The engine never lets a store failure abort a round or a session. Callers
//! wrap every call in [`best_effort`], which logs the failure and substitutes
//! a neutral value (false, empty, none).
//!
//! Backends:
//!   - [`SqliteStore`]: the production store, a SQLite file opened at startup.
//!   - [`MemoryStore`]: in-process, used when the database cannot be opened
//!     and by tests.
//!
//! Items loaded from the config bank have no creation time, so they never
//! count as "recent" for duplicate checks.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::config::BankItem;
use crate::domain::{Item, RoundRecord};
use crate::error::StoreError;
use crate::locale::Language;
use crate::session::SessionSummary;

/// Window used by `find_recent_item` when the caller does not pass one.
pub const DEFAULT_RECENT_WINDOW_HOURS: u32 = 24;

/// Provenance recorded alongside a generated item.
#[derive(Clone, Debug, Default)]
pub struct ItemMetadata {
  pub language: Language,
  pub difficulty: String,
  pub session_key: Option<String>,
  pub player_name: Option<String>,
  pub model: Option<String>,
  pub generation_time_ms: u64,
  pub prompt_tokens: u32,
  pub completion_tokens: u32,
}

/// Filter for offline content. `None` means "any".
#[derive(Clone, Debug)]
pub struct OfflineQuery {
  pub category: Option<String>,
  pub difficulty: Option<String>,
  pub language: Language,
  pub exclude_used: bool,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct GlobalStats {
  pub best_session_score: u64,
  pub best_round_score: u32,
  /// Seconds; `None` until someone has won a round.
  pub fastest_win_secs: Option<f64>,
  pub total_wins: u64,
  pub total_games: u64,
  pub total_sessions: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PlayerStats {
  pub player_name: String,
  pub total_score: u64,
  pub total_wins: u64,
  pub total_rounds: u64,
  pub best_score: u64,
  /// Percent, 0..=100.
  pub win_rate: f64,
  pub recent_sessions: Vec<SessionSummary>,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
  async fn is_available(&self) -> bool;

  /// Loads config bank items as offline content. Malformed entries are
  /// skipped; returns how many were accepted.
  async fn load_bank(&self, bank: &[BankItem]) -> Result<usize, StoreError>;

  async fn find_recent_item(
    &self,
    name: &str,
    category: &str,
    language: Language,
    window_hours: Option<u32>,
  ) -> Result<bool, StoreError>;

  /// Most recent first.
  async fn list_recent_items(
    &self,
    category: &str,
    subcategory: Option<&str>,
    language: Language,
    window_hours: u32,
    limit: usize,
  ) -> Result<Vec<String>, StoreError>;

  async fn save_generated_item(&self, item: &Item, meta: &ItemMetadata) -> Result<i64, StoreError>;

  async fn count_offline_items(&self, query: &OfflineQuery) -> Result<u64, StoreError>;

  async fn fetch_random_offline_item(&self, query: &OfflineQuery) -> Result<Option<Item>, StoreError>;

  async fn mark_used(&self, id: i64) -> Result<bool, StoreError>;

  async fn save_round(&self, record: &RoundRecord, session_id: Option<i64>) -> Result<bool, StoreError>;

  async fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError>;

  /// Ordered by total score, then most recent start.
  async fn top_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StoreError>;

  /// Most recent first.
  async fn player_sessions(&self, player_name: &str, limit: usize) -> Result<Vec<SessionSummary>, StoreError>;

  /// Totals over every session of the player, plus the `limit` most recent.
  async fn player_stats(&self, player_name: &str, limit: usize) -> Result<PlayerStats, StoreError>;

  async fn global_stats(&self) -> Result<GlobalStats, StoreError>;
}

/// Awaits a store call; on failure logs and returns `fallback`.
pub async fn best_effort<T, F>(op: &'static str, fut: F, fallback: T) -> T
where
  F: Future<Output = Result<T, StoreError>>,
{
  match fut.await {
    Ok(v) => v,
    Err(e) => {
      warn!(target: "store", op, error = %e, "Store operation failed; continuing without it");
      fallback
    }
  }
}

/// Comparison key for names, categories and players.
pub(crate) fn match_key(s: &str) -> String {
  s.trim().to_lowercase()
}

/// Bank entries need a name and at least one fact.
pub(crate) fn is_loadable(item: &BankItem) -> bool {
  if item.name.trim().is_empty() || item.facts.is_empty() {
    warn!(target: "store", name = %item.name, "Skipping bank item without a name or facts");
    return false;
  }
  true
}
