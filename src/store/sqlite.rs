//! SQLite store.
//!
//! Every statement runs on the single background thread owned by the
//! `tokio_rusqlite::Connection`. The schema lives in `migrations/` and is
//! applied by refinery when the file is opened. Timestamps are stored as Unix
//! milliseconds; facts, achievements and round records as JSON text.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::{debug, info, instrument};

use super::{
  is_loadable, match_key, GlobalStats, ItemMetadata, ItemStore, OfflineQuery, PlayerStats,
  DEFAULT_RECENT_WINDOW_HOURS,
};
use crate::config::BankItem;
use crate::domain::{GameMode, Item, ItemSource, RoundRecord};
use crate::error::StoreError;
use crate::locale::Language;
use crate::scoring::{Achievement, Grade};
use crate::session::SessionSummary;

mod embedded {
  use refinery::embed_migrations;
  embed_migrations!("migrations");
}

type CallError = tokio_rusqlite::Error<rusqlite::Error>;

fn backend(e: CallError) -> StoreError {
  StoreError::Backend(e.to_string())
}

fn corrupt(e: serde_json::Error) -> StoreError {
  StoreError::Backend(format!("stored JSON is invalid: {e}"))
}

fn millis(t: DateTime<Utc>) -> i64 {
  t.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
  DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Lower bound on `created_at` for a window; 0 hours means no bound.
fn window_start(window_hours: u32) -> i64 {
  if window_hours == 0 {
    return i64::MIN;
  }
  millis(Utc::now() - ChronoDuration::hours(i64::from(window_hours)))
}

fn to_i64(n: u64) -> i64 {
  i64::try_from(n).unwrap_or(i64::MAX)
}

fn limit_param(limit: usize) -> i64 {
  i64::try_from(limit).unwrap_or(i64::MAX)
}

const OFFLINE_FILTER: &str = "language = ?1 \
  AND (?2 IS NULL OR category_key = ?2) \
  AND (?3 IS NULL OR difficulty_key = ?3) \
  AND (?4 = 0 OR used = 0)";

const SESSION_COLUMNS: &str = "id, session_key, player_name, language, difficulty, game_mode, \
  start_time, end_time, total_score, rounds_played, rounds_won, rounds_lost, \
  average_facts_used, average_time_secs, best_round_score, grade, achievements, rounds";

/// A `sessions` row before JSON columns are decoded.
struct SessionRow {
  id: i64,
  session_key: String,
  player_name: String,
  language: String,
  difficulty: String,
  game_mode: String,
  start_time: i64,
  end_time: i64,
  total_score: i64,
  rounds_played: u32,
  rounds_won: u32,
  rounds_lost: u32,
  average_facts_used: f64,
  average_time_secs: f64,
  best_round_score: u32,
  grade: String,
  achievements: String,
  rounds: String,
}

impl SessionRow {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id: row.get(0)?,
      session_key: row.get(1)?,
      player_name: row.get(2)?,
      language: row.get(3)?,
      difficulty: row.get(4)?,
      game_mode: row.get(5)?,
      start_time: row.get(6)?,
      end_time: row.get(7)?,
      total_score: row.get(8)?,
      rounds_played: row.get(9)?,
      rounds_won: row.get(10)?,
      rounds_lost: row.get(11)?,
      average_facts_used: row.get(12)?,
      average_time_secs: row.get(13)?,
      best_round_score: row.get(14)?,
      grade: row.get(15)?,
      achievements: row.get(16)?,
      rounds: row.get(17)?,
    })
  }

  fn into_summary(self) -> Result<SessionSummary, StoreError> {
    let grade = Grade::parse(&self.grade)
      .ok_or_else(|| StoreError::Backend(format!("unknown grade {:?} for session {}", self.grade, self.id)))?;
    let codes: Vec<String> = serde_json::from_str(&self.achievements).map_err(corrupt)?;
    let rounds: Vec<RoundRecord> = serde_json::from_str(&self.rounds).map_err(corrupt)?;
    Ok(SessionSummary {
      session_key: self.session_key,
      id: Some(self.id),
      player_name: self.player_name,
      language: Language::from_code(&self.language),
      difficulty: self.difficulty,
      game_mode: GameMode::from_code(&self.game_mode),
      start_time: from_millis(self.start_time),
      end_time: from_millis(self.end_time),
      total_score: u64::try_from(self.total_score).unwrap_or(0),
      rounds_played: self.rounds_played,
      rounds_won: self.rounds_won,
      rounds_lost: self.rounds_lost,
      average_facts_used: self.average_facts_used,
      average_time_secs: self.average_time_secs,
      best_round_score: self.best_round_score,
      grade,
      achievements: codes.iter().filter_map(|c| Achievement::from_code(c)).collect(),
      rounds,
    })
  }
}

fn decode_sessions(rows: Vec<SessionRow>) -> Result<Vec<SessionSummary>, StoreError> {
  rows.into_iter().map(SessionRow::into_summary).collect()
}

/// Store backed by a SQLite file.
pub struct SqliteStore {
  conn: Arc<Connection>,
}

impl SqliteStore {
  /// Opens (or creates) the database at `path` and brings the schema up to date.
  #[instrument(level = "info", skip_all, fields(path = %path.display()))]
  pub async fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::Backend(format!("cannot create {}: {e}", dir.display())))?;
    }
    let conn = Connection::open(path).await.map_err(|e| StoreError::Backend(e.to_string()))?;

    conn
      .call(|conn| conn.busy_timeout(Duration::from_secs(5)))
      .await
      .map_err(backend)?;
    let applied = conn
      .call(|conn| {
        let report = embedded::migrations::runner().run(conn)?;
        Ok(report.applied_migrations().len())
      })
      .await
      .map_err(|e: tokio_rusqlite::Error<refinery::Error>| StoreError::Backend(e.to_string()))?;

    info!(target: "store", path = %path.display(), applied, "SQLite store ready");
    Ok(Self { conn: Arc::new(conn) })
  }

  async fn query_sessions(&self, sql: String, player_key: Option<String>, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
    let limit = limit_param(limit);
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = match &player_key {
          Some(key) => stmt.query_map(params![key, limit], SessionRow::from_row)?.collect::<Result<Vec<_>, _>>()?,
          None => stmt.query_map(params![limit], SessionRow::from_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
      })
      .await
      .map_err(backend)?;
    decode_sessions(rows)
  }

  #[cfg(test)]
  pub(crate) async fn backdate_item(&self, id: i64, hours: i64) {
    let shift = hours * 3_600_000;
    self
      .conn
      .call(move |conn| conn.execute("UPDATE items SET created_at = created_at - ?2 WHERE id = ?1", params![id, shift]))
      .await
      .map_err(backend)
      .unwrap();
  }
}

#[async_trait]
impl ItemStore for SqliteStore {
  async fn is_available(&self) -> bool {
    self.conn.call(|conn| conn.execute_batch("SELECT 1;")).await.is_ok()
  }

  #[instrument(level = "info", skip_all, fields(count = bank.len()))]
  async fn load_bank(&self, bank: &[BankItem]) -> Result<usize, StoreError> {
    let mut rows = Vec::new();
    for b in bank.iter().filter(|b| is_loadable(b)) {
      let facts = serde_json::to_string(&b.facts).map_err(corrupt)?;
      rows.push((b.clone(), facts));
    }
    let accepted = rows.len();
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO items \
             (name, name_key, category, category_key, subcategory, subcategory_key, \
              difficulty, difficulty_key, language, facts, from_bank) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
          )?;
          for (b, facts) in &rows {
            inserted += stmt.execute(params![
              b.name.trim(),
              match_key(&b.name),
              b.category,
              match_key(&b.category),
              b.subcategory,
              b.subcategory.as_deref().map(match_key),
              b.difficulty,
              b.difficulty.as_deref().map(match_key),
              b.language.code(),
              facts,
            ])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await
      .map_err(backend)?;
    info!(target: "store", accepted, inserted, "Item bank loaded");
    Ok(accepted)
  }

  async fn find_recent_item(
    &self,
    name: &str,
    category: &str,
    language: Language,
    window_hours: Option<u32>,
  ) -> Result<bool, StoreError> {
    let window = window_hours.unwrap_or(DEFAULT_RECENT_WINDOW_HOURS);
    let (name_key, category_key, since) = (match_key(name), match_key(category), window_start(window));
    let found = self
      .conn
      .call(move |conn| {
        conn.query_row(
          "SELECT EXISTS(SELECT 1 FROM items \
           WHERE from_bank = 0 AND name_key = ?1 AND category_key = ?2 AND language = ?3 AND created_at >= ?4)",
          params![name_key, category_key, language.code(), since],
          |row| row.get::<_, bool>(0),
        )
      })
      .await
      .map_err(backend)?;
    if found {
      debug!(target: "store", window, "Recent duplicate found");
    }
    Ok(found)
  }

  async fn list_recent_items(
    &self,
    category: &str,
    subcategory: Option<&str>,
    language: Language,
    window_hours: u32,
    limit: usize,
  ) -> Result<Vec<String>, StoreError> {
    let (category_key, subcategory_key) = (match_key(category), subcategory.map(match_key));
    let (since, limit) = (window_start(window_hours), limit_param(limit));
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT name FROM items \
           WHERE from_bank = 0 AND category_key = ?1 AND language = ?2 AND created_at >= ?3 \
             AND (?4 IS NULL OR subcategory_key = ?4) \
           ORDER BY created_at DESC, id DESC LIMIT ?5",
        )?;
        let names = stmt
          .query_map(params![category_key, language.code(), since, subcategory_key, limit], |row| row.get(0))?
          .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
      })
      .await
      .map_err(backend)
  }

  #[instrument(level = "debug", skip(self, item, meta), fields(facts = item.facts.len()))]
  async fn save_generated_item(&self, item: &Item, meta: &ItemMetadata) -> Result<i64, StoreError> {
    let facts = serde_json::to_string(&item.facts).map_err(corrupt)?;
    let (item, meta) = (item.clone(), meta.clone());
    let category = item.category.clone().unwrap_or_default();
    let difficulty = Some(meta.difficulty.clone()).filter(|d| !d.is_empty());
    let now = millis(Utc::now());
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO items \
           (name, name_key, category, category_key, subcategory, subcategory_key, difficulty, difficulty_key, \
            language, facts, created_at, session_key, player_name, model, \
            generation_time_ms, prompt_tokens, completion_tokens) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
          params![
            item.name,
            match_key(&item.name),
            category,
            match_key(&category),
            item.subcategory,
            item.subcategory.as_deref().map(match_key),
            difficulty,
            difficulty.as_deref().map(match_key),
            meta.language.code(),
            facts,
            now,
            meta.session_key,
            meta.player_name,
            meta.model,
            to_i64(meta.generation_time_ms),
            meta.prompt_tokens,
            meta.completion_tokens,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
      .map_err(backend)?;
    debug!(target: "store", id, "Generated item saved");
    Ok(id)
  }

  async fn count_offline_items(&self, query: &OfflineQuery) -> Result<u64, StoreError> {
    let q = query.clone();
    let sql = format!("SELECT COUNT(*) FROM items WHERE {OFFLINE_FILTER}");
    let count = self
      .conn
      .call(move |conn| {
        conn.query_row(
          &sql,
          params![q.language.code(), q.category.as_deref().map(match_key), q.difficulty.as_deref().map(match_key), q.exclude_used],
          |row| row.get::<_, i64>(0),
        )
      })
      .await
      .map_err(backend)?;
    Ok(u64::try_from(count).unwrap_or(0))
  }

  async fn fetch_random_offline_item(&self, query: &OfflineQuery) -> Result<Option<Item>, StoreError> {
    let q = query.clone();
    let sql = format!(
      "SELECT id, name, facts, category, subcategory FROM items WHERE {OFFLINE_FILTER} ORDER BY RANDOM() LIMIT 1"
    );
    let row = self
      .conn
      .call(move |conn| {
        conn
          .query_row(
            &sql,
            params![q.language.code(), q.category.as_deref().map(match_key), q.difficulty.as_deref().map(match_key), q.exclude_used],
            |row| {
              Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
              ))
            },
          )
          .optional()
      })
      .await
      .map_err(backend)?;

    let Some((id, name, facts, category, subcategory)) = row else {
      return Ok(None);
    };
    Ok(Some(Item {
      name,
      facts: serde_json::from_str(&facts).map_err(corrupt)?,
      question_id: Some(id),
      category: Some(category),
      subcategory,
      source: ItemSource::Store,
    }))
  }

  async fn mark_used(&self, id: i64) -> Result<bool, StoreError> {
    let changed = self
      .conn
      .call(move |conn| conn.execute("UPDATE items SET used = 1 WHERE id = ?1", params![id]))
      .await
      .map_err(backend)?;
    Ok(changed > 0)
  }

  async fn save_round(&self, record: &RoundRecord, session_id: Option<i64>) -> Result<bool, StoreError> {
    let json = serde_json::to_string(record).map_err(corrupt)?;
    let (session_key, correct, score, secs) =
      (record.session_key.clone(), record.correct, record.round_score, record.time_taken_secs);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rounds (session_id, session_key, correct, round_score, time_taken_secs, record) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![session_id, session_key, correct, score, secs, json],
        )
      })
      .await
      .map_err(backend)?;
    Ok(true)
  }

  #[instrument(level = "debug", skip_all, fields(session = %summary.session_key))]
  async fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError> {
    let codes: Vec<String> = summary.achievements.iter().map(Achievement::code).collect();
    let achievements = serde_json::to_string(&codes).map_err(corrupt)?;
    let rounds = serde_json::to_string(&summary.rounds).map_err(corrupt)?;
    let s = summary.clone();
    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO sessions \
           (session_key, player_name, player_key, language, difficulty, game_mode, start_time, end_time, \
            total_score, rounds_played, rounds_won, rounds_lost, average_facts_used, average_time_secs, \
            best_round_score, grade, achievements, rounds) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
          params![
            s.session_key,
            s.player_name,
            match_key(&s.player_name),
            s.language.code(),
            s.difficulty,
            s.game_mode.as_str(),
            millis(s.start_time),
            millis(s.end_time),
            to_i64(s.total_score),
            s.rounds_played,
            s.rounds_won,
            s.rounds_lost,
            s.average_facts_used,
            s.average_time_secs,
            s.best_round_score,
            s.grade.as_str(),
            achievements,
            rounds,
          ],
        )?;
        let id = tx.last_insert_rowid();
        // Rounds saved before the session existed get linked now.
        tx.execute(
          "UPDATE rounds SET session_id = ?1 WHERE session_id IS NULL AND session_key = ?2",
          params![id, s.session_key],
        )?;
        tx.commit()?;
        Ok(id)
      })
      .await
      .map_err(backend)?;
    info!(target: "store", id, score = summary.total_score, "Session saved");
    Ok(id)
  }

  async fn top_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY total_score DESC, start_time DESC LIMIT ?1");
    self.query_sessions(sql, None, limit).await
  }

  async fn player_sessions(&self, player_name: &str, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
    let sql =
      format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE player_key = ?1 ORDER BY start_time DESC LIMIT ?2");
    self.query_sessions(sql, Some(match_key(player_name)), limit).await
  }

  async fn player_stats(&self, player_name: &str, limit: usize) -> Result<PlayerStats, StoreError> {
    let recent_sessions = self.player_sessions(player_name, limit).await?;
    let key = match_key(player_name);
    let (total_score, total_wins, total_rounds, best_score) = self
      .conn
      .call(move |conn| {
        conn.query_row(
          "SELECT COALESCE(SUM(total_score), 0), COALESCE(SUM(rounds_won), 0), \
                  COALESCE(SUM(rounds_played), 0), COALESCE(MAX(total_score), 0) \
           FROM sessions WHERE player_key = ?1",
          params![key],
          |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?)),
        )
      })
      .await
      .map_err(backend)?;

    let mut stats = PlayerStats {
      player_name: player_name.trim().to_string(),
      total_score: u64::try_from(total_score).unwrap_or(0),
      total_wins: u64::try_from(total_wins).unwrap_or(0),
      total_rounds: u64::try_from(total_rounds).unwrap_or(0),
      best_score: u64::try_from(best_score).unwrap_or(0),
      recent_sessions,
      ..Default::default()
    };
    if stats.total_rounds > 0 {
      stats.win_rate = stats.total_wins as f64 / stats.total_rounds as f64 * 100.0;
    }
    Ok(stats)
  }

  async fn global_stats(&self) -> Result<GlobalStats, StoreError> {
    self
      .conn
      .call(|conn| {
        let (best_session_score, total_sessions) = conn.query_row(
          "SELECT COALESCE(MAX(total_score), 0), COUNT(*) FROM sessions",
          [],
          |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        let (total_games, total_wins, best_round_score, fastest_win_secs) = conn.query_row(
          "SELECT COUNT(*), COALESCE(SUM(correct), 0), COALESCE(MAX(round_score), 0), \
                  MIN(CASE WHEN correct = 1 THEN time_taken_secs END) \
           FROM rounds",
          [],
          |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, u32>(2)?, row.get::<_, Option<f64>>(3)?))
          },
        )?;
        Ok(GlobalStats {
          best_session_score: u64::try_from(best_session_score).unwrap_or(0),
          best_round_score,
          fastest_win_secs,
          total_wins: u64::try_from(total_wins).unwrap_or(0),
          total_games: u64::try_from(total_games).unwrap_or(0),
          total_sessions: u64::try_from(total_sessions).unwrap_or(0),
        })
      })
      .await
      .map_err(backend)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::MatchType;
  use crate::scoring::tests::record;
  use crate::store::memory::tests::{bank_item, item, query, summary};

  async fn open_in(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("nested").join("guessr.db")).await.unwrap()
  }

  #[tokio::test]
  async fn recent_duplicates_respect_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_in(&dir).await;
    assert!(store.is_available().await);
    let id = store.save_generated_item(&item("Owl", "Animals"), &ItemMetadata::default()).await.unwrap();

    assert!(store.find_recent_item(" owl ", "ANIMALS", Language::En, Some(72)).await.unwrap());
    assert!(!store.find_recent_item("owl", "plants", Language::En, Some(72)).await.unwrap());
    assert!(!store.find_recent_item("owl", "animals", Language::Pl, Some(72)).await.unwrap());

    store.backdate_item(id, 30).await;
    assert!(!store.find_recent_item("Owl", "Animals", Language::En, None).await.unwrap());
    assert!(store.find_recent_item("Owl", "Animals", Language::En, Some(72)).await.unwrap());
    assert!(store.find_recent_item("Owl", "Animals", Language::En, Some(0)).await.unwrap());

    for name in ["Eagle", "Kiwi"] {
      store.save_generated_item(&item(name, "Animals"), &ItemMetadata::default()).await.unwrap();
    }
    let names = store.list_recent_items("animals", Some("BIRDS"), Language::En, 24, 5).await.unwrap();
    assert_eq!(names, vec!["Kiwi", "Eagle"]);
  }

  #[tokio::test]
  async fn used_flags_and_bank_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let bank = vec![bank_item("Paris", "Places"), bank_item("", "Places")];
    {
      let store = open_in(&dir).await;
      assert_eq!(store.load_bank(&bank).await.unwrap(), 1);
      assert!(!store.find_recent_item("Paris", "Places", Language::En, Some(0)).await.unwrap());

      let it = store.fetch_random_offline_item(&query(Some("places"), true)).await.unwrap().unwrap();
      assert_eq!(it.name, "Paris");
      assert_eq!(it.source, ItemSource::Store);
      assert_eq!(it.facts.len(), 5);
      assert!(store.mark_used(it.question_id.unwrap()).await.unwrap());
      assert!(!store.mark_used(999).await.unwrap());
    }

    let store = open_in(&dir).await;
    // Loading the bank again on the next start does not duplicate it.
    assert_eq!(store.load_bank(&bank).await.unwrap(), 1);
    assert_eq!(store.count_offline_items(&query(Some("Places"), false)).await.unwrap(), 1);
    assert_eq!(store.count_offline_items(&query(Some("Places"), true)).await.unwrap(), 0);
    assert!(store.fetch_random_offline_item(&query(None, true)).await.unwrap().is_none());

    let hard = OfflineQuery { difficulty: Some("hard".into()), ..query(None, false) };
    assert_eq!(store.count_offline_items(&hard).await.unwrap(), 0);
    let easy = OfflineQuery { difficulty: Some("EASY".into()), ..query(None, false) };
    assert_eq!(store.count_offline_items(&easy).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn leaderboard_orders_by_score_then_recency() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_in(&dir).await;
    let t0 = Utc::now() - ChronoDuration::hours(2);
    let t1 = Utc::now() - ChronoDuration::hours(1);
    store.save_session(&summary("a", 500, t0)).await.unwrap();
    store.save_session(&summary("b", 900, t0)).await.unwrap();
    store.save_session(&summary("c", 500, t1)).await.unwrap();

    let top = store.top_sessions(10).await.unwrap();
    let order: Vec<&str> = top.iter().map(|s| s.player_name.as_str()).collect();
    assert_eq!(order, vec!["b", "c", "a"]);
    assert!(top.iter().all(|s| s.id.is_some()));
    assert_eq!(store.top_sessions(1).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn sessions_and_stats_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();
    let mut s = summary("Ada", 1200, now);
    s.grade = Grade::APlus;
    s.game_mode = GameMode::Offline;
    s.achievements = vec![Achievement::MindReader, Achievement::CategoryExpert("Animals".into())];
    let mut win = record("animals", true, 1, 12.0, MatchType::Exact);
    win.session_key = s.session_key.clone();
    win.round_score = 1200;
    s.rounds = vec![win.clone()];
    {
      let store = open_in(&dir).await;
      store.save_round(&win, None).await.unwrap();
      store.save_round(&record("animals", false, 3, 40.0, MatchType::Different), None).await.unwrap();
      store.save_session(&s).await.unwrap();
      store.save_session(&summary("ada", 300, now - ChronoDuration::hours(1))).await.unwrap();
    }

    let store = open_in(&dir).await;
    let mine = store.player_sessions(" ADA ", 10).await.unwrap();
    assert_eq!(mine.len(), 2);
    let first = &mine[0];
    assert_eq!(first.session_key, s.session_key);
    assert_eq!(first.grade, Grade::APlus);
    assert_eq!(first.game_mode, GameMode::Offline);
    assert_eq!(first.achievements, s.achievements);
    assert_eq!(first.rounds.len(), 1);
    assert_eq!(first.rounds[0].item_name, win.item_name);
    assert_eq!(first.start_time.timestamp_millis(), now.timestamp_millis());

    let p = store.player_stats("ada", 1).await.unwrap();
    assert_eq!(p.total_score, 1500);
    assert_eq!(p.best_score, 1200);
    assert_eq!(p.total_rounds, 4);
    assert_eq!(p.win_rate, 50.0);
    assert_eq!(p.recent_sessions.len(), 1);

    let g = store.global_stats().await.unwrap();
    assert_eq!(g.total_sessions, 2);
    assert_eq!(g.best_session_score, 1200);
    assert_eq!(g.best_round_score, 1200);
    assert_eq!(g.total_games, 2);
    assert_eq!(g.total_wins, 1);
    assert_eq!(g.fastest_win_secs, Some(12.0));
  }

  #[tokio::test]
  async fn duplicate_session_key_is_a_backend_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_in(&dir).await;
    let s = summary("a", 10, Utc::now());
    store.save_session(&s).await.unwrap();
    assert!(matches!(store.save_session(&s).await, Err(StoreError::Backend(_))));
  }
}
