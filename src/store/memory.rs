//! In-process store. Everything lives behind one `RwLock` and is lost on
//! restart; `set_available` simulates the backend going away.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::{
  is_loadable, match_key, GlobalStats, ItemMetadata, ItemStore, OfflineQuery, PlayerStats,
  DEFAULT_RECENT_WINDOW_HOURS,
};
use crate::config::BankItem;
use crate::domain::{Item, ItemSource, RoundRecord};
use crate::error::StoreError;
use crate::locale::Language;
use crate::session::SessionSummary;

#[derive(Clone, Debug)]
struct StoredItem {
  id: i64,
  name: String,
  facts: Vec<String>,
  category: String,
  subcategory: Option<String>,
  difficulty: Option<String>,
  language: Language,
  created_at: Option<DateTime<Utc>>,
  used: bool,
}

impl StoredItem {
  fn to_item(&self) -> Item {
    Item {
      name: self.name.clone(),
      facts: self.facts.clone(),
      question_id: Some(self.id),
      category: Some(self.category.clone()),
      subcategory: self.subcategory.clone(),
      source: ItemSource::Store,
    }
  }

  fn matches(&self, q: &OfflineQuery) -> bool {
    self.language == q.language
      && q.category.as_deref().map_or(true, |c| eq_ci(&self.category, c))
      && q.difficulty.as_deref().map_or(true, |d| self.difficulty.as_deref().is_some_and(|own| eq_ci(own, d)))
      && !(q.exclude_used && self.used)
  }

  fn within(&self, window_hours: u32, now: DateTime<Utc>) -> bool {
    if window_hours == 0 {
      return true;
    }
    let since = now - ChronoDuration::hours(i64::from(window_hours));
    self.created_at.is_some_and(|t| t >= since)
  }
}

#[derive(Default)]
struct Inner {
  items: Vec<StoredItem>,
  rounds: Vec<(Option<i64>, RoundRecord)>,
  sessions: Vec<SessionSummary>,
  next_id: i64,
}

impl Inner {
  fn next_id(&mut self) -> i64 {
    self.next_id += 1;
    self.next_id
  }
}

/// In-process store. Shared by every session through `Arc<dyn ItemStore>`.
pub struct MemoryStore {
  inner: RwLock<Inner>,
  available: AtomicBool,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self { inner: RwLock::new(Inner::default()), available: AtomicBool::new(true) }
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Simulates the backend going away (or coming back).
  #[cfg(test)]
  pub(crate) fn set_available(&self, available: bool) {
    self.available.store(available, Ordering::SeqCst);
  }

  fn check(&self) -> Result<(), StoreError> {
    if self.available.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(StoreError::Unavailable)
    }
  }

  #[cfg(test)]
  pub(crate) async fn backdate_item(&self, id: i64, hours: i64) {
    let mut inner = self.inner.write().await;
    if let Some(it) = inner.items.iter_mut().find(|i| i.id == id) {
      it.created_at = it.created_at.map(|t| t - ChronoDuration::hours(hours));
    }
  }
}

fn eq_ci(a: &str, b: &str) -> bool {
  match_key(a) == match_key(b)
}

fn leaderboard_order(a: &SessionSummary, b: &SessionSummary) -> std::cmp::Ordering {
  b.total_score.cmp(&a.total_score).then(b.start_time.cmp(&a.start_time))
}

#[async_trait]
impl ItemStore for MemoryStore {
  async fn is_available(&self) -> bool {
    self.check().is_ok()
  }

  #[instrument(level = "info", skip_all, fields(count = bank.len()))]
  async fn load_bank(&self, bank: &[BankItem]) -> Result<usize, StoreError> {
    self.check()?;
    let mut inner = self.inner.write().await;
    let mut loaded = 0;
    for b in bank.iter().filter(|b| is_loadable(b)) {
      let id = inner.next_id();
      inner.items.push(StoredItem {
        id,
        name: b.name.trim().to_string(),
        facts: b.facts.clone(),
        category: b.category.clone(),
        subcategory: b.subcategory.clone(),
        difficulty: b.difficulty.clone(),
        language: b.language,
        created_at: None,
        used: false,
      });
      loaded += 1;
    }
    info!(target: "store", loaded, "Item bank loaded");
    Ok(loaded)
  }

  async fn find_recent_item(
    &self,
    name: &str,
    category: &str,
    language: Language,
    window_hours: Option<u32>,
  ) -> Result<bool, StoreError> {
    self.check()?;
    let window = window_hours.unwrap_or(DEFAULT_RECENT_WINDOW_HOURS);
    let now = Utc::now();
    let inner = self.inner.read().await;
    let found = inner.items.iter().any(|i| {
      i.created_at.is_some()
        && eq_ci(&i.name, name)
        && eq_ci(&i.category, category)
        && i.language == language
        && i.within(window, now)
    });
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
    self.check()?;
    let now = Utc::now();
    let inner = self.inner.read().await;
    let mut recent: Vec<&StoredItem> = inner
      .items
      .iter()
      .filter(|i| {
        i.created_at.is_some()
          && eq_ci(&i.category, category)
          && subcategory.map_or(true, |s| i.subcategory.as_deref().is_some_and(|own| eq_ci(own, s)))
          && i.language == language
          && i.within(window_hours, now)
      })
      .collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(recent.into_iter().take(limit).map(|i| i.name.clone()).collect())
  }

  #[instrument(level = "debug", skip(self, item, meta), fields(facts = item.facts.len()))]
  async fn save_generated_item(&self, item: &Item, meta: &ItemMetadata) -> Result<i64, StoreError> {
    self.check()?;
    let mut inner = self.inner.write().await;
    let id = inner.next_id();
    inner.items.push(StoredItem {
      id,
      name: item.name.clone(),
      facts: item.facts.clone(),
      category: item.category.clone().unwrap_or_default(),
      subcategory: item.subcategory.clone(),
      difficulty: Some(meta.difficulty.clone()).filter(|d| !d.is_empty()),
      language: meta.language,
      created_at: Some(Utc::now()),
      used: false,
    });
    debug!(
      target: "store",
      id,
      session = meta.session_key.as_deref().unwrap_or("-"),
      player = meta.player_name.as_deref().unwrap_or("-"),
      model = meta.model.as_deref().unwrap_or("-"),
      generation_ms = meta.generation_time_ms,
      prompt_tokens = meta.prompt_tokens,
      completion_tokens = meta.completion_tokens,
      "Generated item saved"
    );
    Ok(id)
  }

  async fn count_offline_items(&self, query: &OfflineQuery) -> Result<u64, StoreError> {
    self.check()?;
    let inner = self.inner.read().await;
    Ok(inner.items.iter().filter(|i| i.matches(query)).count() as u64)
  }

  async fn fetch_random_offline_item(&self, query: &OfflineQuery) -> Result<Option<Item>, StoreError> {
    self.check()?;
    let inner = self.inner.read().await;
    let matching: Vec<&StoredItem> = inner.items.iter().filter(|i| i.matches(query)).collect();
    Ok(matching.choose(&mut rand::thread_rng()).map(|i| i.to_item()))
  }

  async fn mark_used(&self, id: i64) -> Result<bool, StoreError> {
    self.check()?;
    let mut inner = self.inner.write().await;
    match inner.items.iter_mut().find(|i| i.id == id) {
      Some(i) => {
        i.used = true;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn save_round(&self, record: &RoundRecord, session_id: Option<i64>) -> Result<bool, StoreError> {
    self.check()?;
    self.inner.write().await.rounds.push((session_id, record.clone()));
    Ok(true)
  }

  #[instrument(level = "debug", skip_all, fields(session = %summary.session_key))]
  async fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError> {
    self.check()?;
    let mut inner = self.inner.write().await;
    let id = inner.next_id();
    let mut stored = summary.clone();
    stored.id = Some(id);
    // Rounds saved before the session existed get linked now.
    for (sid, r) in inner.rounds.iter_mut() {
      if sid.is_none() && r.session_key == summary.session_key {
        *sid = Some(id);
      }
    }
    inner.sessions.push(stored);
    info!(target: "store", id, score = summary.total_score, "Session saved");
    Ok(id)
  }

  async fn top_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
    self.check()?;
    let inner = self.inner.read().await;
    let mut all: Vec<SessionSummary> = inner.sessions.clone();
    all.sort_by(leaderboard_order);
    all.truncate(limit);
    Ok(all)
  }

  async fn player_sessions(&self, player_name: &str, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
    self.check()?;
    let inner = self.inner.read().await;
    let mut mine: Vec<SessionSummary> =
      inner.sessions.iter().filter(|s| eq_ci(&s.player_name, player_name)).cloned().collect();
    mine.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    mine.truncate(limit);
    Ok(mine)
  }

  async fn player_stats(&self, player_name: &str, limit: usize) -> Result<PlayerStats, StoreError> {
    let recent_sessions = self.player_sessions(player_name, limit).await?;
    let inner = self.inner.read().await;
    let mut stats = PlayerStats { player_name: player_name.trim().to_string(), ..Default::default() };
    for s in inner.sessions.iter().filter(|s| eq_ci(&s.player_name, player_name)) {
      stats.total_score += s.total_score;
      stats.total_wins += u64::from(s.rounds_won);
      stats.total_rounds += u64::from(s.rounds_played);
      stats.best_score = stats.best_score.max(s.total_score);
    }
    if stats.total_rounds > 0 {
      stats.win_rate = stats.total_wins as f64 / stats.total_rounds as f64 * 100.0;
    }
    stats.recent_sessions = recent_sessions;
    Ok(stats)
  }

  async fn global_stats(&self) -> Result<GlobalStats, StoreError> {
    self.check()?;
    let inner = self.inner.read().await;
    let mut stats = GlobalStats {
      best_session_score: inner.sessions.iter().map(|s| s.total_score).max().unwrap_or(0),
      total_sessions: inner.sessions.len() as u64,
      ..Default::default()
    };
    for (_, r) in &inner.rounds {
      stats.total_games += 1;
      stats.best_round_score = stats.best_round_score.max(r.round_score);
      if r.correct {
        stats.total_wins += 1;
        stats.fastest_win_secs = Some(match stats.fastest_win_secs {
          Some(best) => best.min(r.time_taken_secs),
          None => r.time_taken_secs,
        });
      }
    }
    Ok(stats)
  }
}

#[cfg(test)]
pub(super) mod tests {
  use super::*;
  use crate::domain::{GameMode, MatchType};
  use crate::scoring::tests::record;
  use crate::scoring::Grade;
  use crate::store::best_effort;

  pub(crate) fn item(name: &str, category: &str) -> Item {
    Item {
      name: name.into(),
      facts: vec!["a".into(); 5],
      question_id: None,
      category: Some(category.into()),
      subcategory: Some("birds".into()),
      source: ItemSource::Generated,
    }
  }

  pub(crate) fn summary(player: &str, score: u64, start: DateTime<Utc>) -> SessionSummary {
    SessionSummary {
      session_key: uuid::Uuid::new_v4().to_string(),
      id: None,
      player_name: player.into(),
      language: Language::En,
      difficulty: "normal".into(),
      game_mode: GameMode::Online,
      start_time: start,
      end_time: start,
      total_score: score,
      rounds_played: 2,
      rounds_won: 1,
      rounds_lost: 1,
      average_facts_used: 1.0,
      average_time_secs: 10.0,
      best_round_score: score as u32,
      grade: Grade::C,
      achievements: Vec::new(),
      rounds: Vec::new(),
    }
  }

  pub(crate) fn bank_item(name: &str, category: &str) -> BankItem {
    BankItem {
      name: name.into(),
      category: category.into(),
      subcategory: None,
      difficulty: Some("easy".into()),
      language: Language::En,
      facts: vec!["f".into(); 5],
    }
  }

  pub(crate) fn query(category: Option<&str>, exclude_used: bool) -> OfflineQuery {
    OfflineQuery { category: category.map(str::to_string), difficulty: None, language: Language::En, exclude_used }
  }

  #[tokio::test]
  async fn recent_duplicates_respect_the_window() {
    let store = MemoryStore::new();
    let id = store.save_generated_item(&item("Owl", "Animals"), &ItemMetadata::default()).await.unwrap();

    assert!(store.find_recent_item("owl", "animals", Language::En, Some(72)).await.unwrap());
    assert!(!store.find_recent_item("owl", "plants", Language::En, Some(72)).await.unwrap());
    assert!(!store.find_recent_item("owl", "animals", Language::Pl, Some(72)).await.unwrap());

    store.backdate_item(id, 30).await;
    assert!(!store.find_recent_item("Owl", "Animals", Language::En, None).await.unwrap());
    assert!(store.find_recent_item("Owl", "Animals", Language::En, Some(72)).await.unwrap());
  }

  #[tokio::test]
  async fn recent_list_is_newest_first_and_limited() {
    let store = MemoryStore::new();
    for name in ["Owl", "Eagle", "Kiwi"] {
      store.save_generated_item(&item(name, "Animals"), &ItemMetadata::default()).await.unwrap();
    }
    let names = store.list_recent_items("animals", Some("BIRDS"), Language::En, 48, 2).await.unwrap();
    assert_eq!(names, vec!["Kiwi", "Eagle"]);
  }

  #[tokio::test]
  async fn bank_items_are_offline_content_but_never_recent() {
    let store = MemoryStore::new();
    let bank = vec![bank_item("Paris", "Places")];
    assert_eq!(store.load_bank(&bank).await.unwrap(), 1);
    assert!(!store.find_recent_item("Paris", "Places", Language::En, Some(72)).await.unwrap());

    let q = query(Some("places"), true);
    assert_eq!(store.count_offline_items(&q).await.unwrap(), 1);
    let it = store.fetch_random_offline_item(&q).await.unwrap().unwrap();
    assert_eq!(it.name, "Paris");
    assert_eq!(it.source, ItemSource::Store);

    assert!(store.mark_used(it.question_id.unwrap()).await.unwrap());
    assert_eq!(store.count_offline_items(&q).await.unwrap(), 0);
    assert_eq!(store.count_offline_items(&query(Some("places"), false)).await.unwrap(), 1);
    assert!(!store.mark_used(999).await.unwrap());

    let hard = OfflineQuery { difficulty: Some("hard".into()), ..query(None, false) };
    assert_eq!(store.count_offline_items(&hard).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn leaderboard_orders_by_score_then_recency() {
    let store = MemoryStore::new();
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
  async fn player_and_global_stats() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let s = summary("Ada", 1200, now);
    let mut win = record("animals", true, 1, 12.0, MatchType::Exact);
    win.session_key = s.session_key.clone();
    win.round_score = 1200;
    let loss = record("animals", false, 3, 40.0, MatchType::Different);
    store.save_round(&win, None).await.unwrap();
    store.save_round(&loss, None).await.unwrap();
    store.save_session(&s).await.unwrap();
    store.save_session(&summary("ada", 300, now - ChronoDuration::hours(1))).await.unwrap();

    let p = store.player_stats("ADA", 1).await.unwrap();
    assert_eq!(p.total_score, 1500);
    assert_eq!(p.best_score, 1200);
    assert_eq!(p.total_rounds, 4);
    assert_eq!(p.win_rate, 50.0);
    assert_eq!(p.recent_sessions.len(), 1);
    assert_eq!(p.recent_sessions[0].total_score, 1200);

    let g = store.global_stats().await.unwrap();
    assert_eq!(g.total_sessions, 2);
    assert_eq!(g.best_session_score, 1200);
    assert_eq!(g.best_round_score, 1200);
    assert_eq!(g.total_games, 2);
    assert_eq!(g.total_wins, 1);
    assert_eq!(g.fastest_win_secs, Some(12.0));
  }

  #[tokio::test]
  async fn unavailable_store_degrades_through_best_effort() {
    let store = MemoryStore::new();
    store.set_available(false);
    assert!(!store.is_available().await);
    assert!(matches!(store.top_sessions(10).await, Err(StoreError::Unavailable)));

    let top = best_effort("top_sessions", store.top_sessions(10), Vec::new()).await;
    assert!(top.is_empty());
    let dup = best_effort("find_recent_item", store.find_recent_item("x", "y", Language::En, None), false).await;
    assert!(!dup);
    let saved = best_effort("save_round", store.save_round(&record("a", true, 1, 1.0, MatchType::Exact), None), false).await;
    assert!(!saved);

    store.set_available(true);
    assert!(store.is_available().await);
  }
}
