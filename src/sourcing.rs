//! Content sourcing: where the next round's item comes from.
//!
//! Online: up to `max_attempts` generations with an avoid-list and escalating
//! temperature. A candidate recently seen in the store for the same category
//! and language is rejected and added to the avoid-list, except on the final
//! attempt where it is accepted with a warning. When generation is impossible
//! or keeps failing we fall back to a random stored item, and finally to the
//! localized error placeholder.
//!
//! Offline: store only. "No matching content" and "could not fetch" are
//! reported separately so the caller can react to each.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::SourcingSettings;
use crate::domain::{DifficultyLevel, Item, ItemSource};
use crate::error::{GenerationError, SourcingError};
use crate::generator::{GenerationRequest, ItemGenerator};
use crate::locale::Language;
use crate::seeds::generation_error_item;
use crate::store::{best_effort, ItemMetadata, ItemStore, OfflineQuery};

/// Names remembered per (category, language) when the store is unreachable.
const LOCAL_TRACKING_LIMIT: usize = 100;

#[derive(Clone, Debug)]
pub struct SourceRequest {
  /// Canonical (English) category name; the key for duplicate checks.
  pub category: String,
  /// Localized subcategory hint, if one was picked.
  pub subcategory: Option<String>,
  pub difficulty: DifficultyLevel,
  pub language: Language,
  pub session_key: Option<String>,
  pub player_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SourcedItem {
  pub item: Item,
  /// Generation attempts made (0 when no generator was available).
  pub attempts: u32,
  pub duplicate_accepted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfflineMode {
  /// Pick among unused items and mark the pick as used.
  Consume,
  /// Pick among all items; nothing is marked.
  Replay,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct OfflineStatus {
  pub total: u64,
  pub unused: u64,
  pub used: u64,
  pub offline_available: bool,
}

pub struct ContentSourcer {
  generator: Option<Arc<dyn ItemGenerator>>,
  store: Arc<dyn ItemStore>,
  settings: SourcingSettings,
  // (category lowercase, language) -> names, oldest first
  local: Mutex<HashMap<(String, Language), Vec<String>>>,
}

impl ContentSourcer {
  pub fn new(generator: Option<Arc<dyn ItemGenerator>>, store: Arc<dyn ItemStore>, settings: SourcingSettings) -> Self {
    Self { generator, store, settings, local: Mutex::new(HashMap::new()) }
  }

  pub fn has_generator(&self) -> bool {
    self.generator.is_some()
  }

  /// Never fails: the worst case is the error placeholder item.
  #[instrument(level = "info", skip(self, req), fields(category = %req.category, language = req.language.code(), difficulty = %req.difficulty.name))]
  pub async fn source_item(&self, req: &SourceRequest) -> SourcedItem {
    let mut attempts = 0;
    if let Some(generator) = &self.generator {
      let (generated, n) = self.generate_unique(generator.as_ref(), req).await;
      attempts = n;
      if let Some(sourced) = generated {
        return sourced;
      }
    } else {
      warn!(target: "sourcing", error = %GenerationError::NoClient, "Generation unavailable; trying stored content");
    }

    let query = OfflineQuery {
      category: Some(req.category.clone()),
      difficulty: None,
      language: req.language,
      exclude_used: false,
    };
    let stored = best_effort("fetch_random_offline_item", self.store.fetch_random_offline_item(&query), None).await;
    if let Some(mut item) = stored {
      item.source = ItemSource::Store;
      info!(target: "sourcing", question_id = ?item.question_id, "Using stored item as fallback");
      return SourcedItem { item, attempts, duplicate_accepted: false };
    }

    error!(target: "sourcing", attempts, "No content available; returning error item");
    SourcedItem {
      item: generation_error_item(req.language.locale(), Some(&req.category)),
      attempts,
      duplicate_accepted: false,
    }
  }

  /// The retry loop. Returns the accepted item (if any) and the number of attempts made.
  async fn generate_unique(&self, generator: &dyn ItemGenerator, req: &SourceRequest) -> (Option<SourcedItem>, u32) {
    let max = self.settings.max_attempts.max(1);
    let mut avoid = self.avoid_list(req).await;
    let timeout = self.settings.generation_timeout();

    for attempt in 0..max {
      let last = attempt + 1 == max;
      let gen_req = GenerationRequest {
        category: req.category.clone(),
        subcategory: req.subcategory.clone(),
        language: req.language,
        difficulty_hint: req.difficulty.prompt_hint.clone(),
        avoid: tail(&avoid, self.settings.avoid_list_prompt_len),
        attempt,
        temperature: self.settings.temperature(attempt),
      };
      info!(target: "sourcing", attempt = attempt + 1, max, temperature = gen_req.temperature, avoid = gen_req.avoid.len(), "Generation attempt");

      let result = match tokio::time::timeout(timeout, generator.generate(&gen_req)).await {
        Ok(r) => r,
        Err(_) => Err(GenerationError::Timeout(timeout)),
      };

      let generated = match result {
        Ok(g) => g,
        Err(e) if e.is_retryable() && !last => {
          warn!(target: "sourcing", attempt = attempt + 1, error = %e, "Generation attempt failed; retrying");
          continue;
        }
        Err(e) => {
          error!(target: "sourcing", attempt = attempt + 1, error = %e, "Generation failed; giving up on generation");
          return (None, attempt + 1);
        }
      };

      let duplicate = self.is_duplicate(&generated.name, req).await;
      if duplicate && !last {
        warn!(target: "sourcing", attempt = attempt + 1, "Duplicate item generated; retrying");
        avoid.push(generated.name);
        continue;
      }
      if duplicate {
        warn!(target: "sourcing", attempt = attempt + 1, "Max attempts reached; accepting possibly duplicate item");
      }

      self.track(&generated.name, req);
      let mut item = Item {
        name: generated.name,
        facts: generated.facts,
        question_id: None,
        category: Some(req.category.clone()),
        subcategory: req.subcategory.clone(),
        source: ItemSource::Generated,
      };
      let usage = generated.usage.unwrap_or_default();
      let meta = ItemMetadata {
        language: req.language,
        difficulty: req.difficulty.name.clone(),
        session_key: req.session_key.clone(),
        player_name: req.player_name.clone(),
        model: Some(generator.model_name().to_string()),
        generation_time_ms: generated.latency.as_millis() as u64,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
      };
      item.question_id = self.save_generated(&item, meta).await;
      info!(target: "sourcing", attempt = attempt + 1, question_id = ?item.question_id, "Generated unique item");
      return (Some(SourcedItem { item, attempts: attempt + 1, duplicate_accepted: duplicate }), attempt + 1);
    }
    (None, max)
  }

  /// Saves in a spawned task and waits at most `save_timeout` for the id. A
  /// slow store costs the round its question id, never its start.
  async fn save_generated(&self, item: &Item, meta: ItemMetadata) -> Option<i64> {
    let store = self.store.clone();
    let item = item.clone();
    let save = tokio::spawn(async move {
      best_effort("save_generated_item", async { store.save_generated_item(&item, &meta).await.map(Some) }, None).await
    });
    match tokio::time::timeout(self.settings.save_timeout(), save).await {
      Ok(Ok(id)) => id,
      Ok(Err(e)) => {
        error!(target: "sourcing", error = %e, "Item save task failed");
        None
      }
      Err(_) => {
        warn!(target: "sourcing", timeout_ms = self.settings.save_timeout_ms, "Item save still running; round starts without a question id");
        None
      }
    }
  }

  /// Offline round content, store only.
  #[instrument(level = "info", skip(self))]
  pub async fn source_offline(
    &self,
    category: Option<&str>,
    difficulty: Option<&str>,
    language: Language,
    mode: OfflineMode,
  ) -> Result<Item, SourcingError> {
    let query = OfflineQuery {
      category: category.map(str::to_string),
      difficulty: difficulty.map(str::to_string),
      language,
      exclude_used: mode == OfflineMode::Consume,
    };
    let available = best_effort("count_offline_items", self.store.count_offline_items(&query), 0).await;
    if available == 0 {
      info!(target: "sourcing", "No offline content for filters");
      return Err(SourcingError::NoOfflineContent { available: 0 });
    }

    let Some(mut item) = best_effort("fetch_random_offline_item", self.store.fetch_random_offline_item(&query), None).await
    else {
      error!(target: "sourcing", available, "Offline content counted but could not be fetched");
      return Err(SourcingError::OfflineFetchFailed { available });
    };
    item.source = ItemSource::Offline;

    if mode == OfflineMode::Consume {
      if let Some(id) = item.question_id {
        best_effort("mark_used", self.store.mark_used(id), false).await;
      }
    }
    info!(target: "sourcing", available, question_id = ?item.question_id, ?mode, "Offline item selected");
    Ok(item)
  }

  pub async fn offline_status(&self, category: Option<&str>, difficulty: Option<&str>, language: Language) -> OfflineStatus {
    let mut query = OfflineQuery {
      category: category.map(str::to_string),
      difficulty: difficulty.map(str::to_string),
      language,
      exclude_used: false,
    };
    let total = best_effort("count_offline_items", self.store.count_offline_items(&query), 0).await;
    query.exclude_used = true;
    let unused = best_effort("count_offline_items", self.store.count_offline_items(&query), 0).await;
    OfflineStatus { total, unused, used: total.saturating_sub(unused), offline_available: unused > 0 }
  }

  /// Recent names from the store, merged with local tracking.
  async fn avoid_list(&self, req: &SourceRequest) -> Vec<String> {
    let mut names = match self
      .store
      .list_recent_items(
        &req.category,
        req.subcategory.as_deref(),
        req.language,
        self.settings.avoid_window_hours,
        self.settings.avoid_list_limit,
      )
      .await
    {
      Ok(mut v) => {
        // store order is newest first; prompts take the tail
        v.reverse();
        v
      }
      Err(e) => {
        warn!(target: "sourcing", error = %e, "Recent items unavailable; using local tracking");
        Vec::new()
      }
    };
    for n in self.local_names(req) {
      if !names.iter().any(|x| x.eq_ignore_ascii_case(&n)) {
        names.push(n);
      }
    }
    names
  }

  /// Store is authoritative; local tracking only answers when the store cannot.
  async fn is_duplicate(&self, name: &str, req: &SourceRequest) -> bool {
    match self
      .store
      .find_recent_item(name, &req.category, req.language, Some(self.settings.duplicate_window_hours))
      .await
    {
      Ok(found) => found,
      Err(e) => {
        warn!(target: "sourcing", error = %e, "Duplicate check fell back to local tracking");
        let needle = name.trim().to_lowercase();
        self.local_names(req).iter().any(|n| n.to_lowercase() == needle)
      }
    }
  }

  fn local_key(req: &SourceRequest) -> (String, Language) {
    (req.category.to_lowercase(), req.language)
  }

  fn local_names(&self, req: &SourceRequest) -> Vec<String> {
    let local = self.local.lock().unwrap_or_else(|e| e.into_inner());
    local.get(&Self::local_key(req)).cloned().unwrap_or_default()
  }

  fn track(&self, name: &str, req: &SourceRequest) {
    let mut local = self.local.lock().unwrap_or_else(|e| e.into_inner());
    let names = local.entry(Self::local_key(req)).or_default();
    names.push(name.to_string());
    if names.len() > LOCAL_TRACKING_LIMIT {
      let excess = names.len() - LOCAL_TRACKING_LIMIT;
      names.drain(..excess);
    }
  }

  pub fn reset_tracking(&self) {
    self.local.lock().unwrap_or_else(|e| e.into_inner()).clear();
  }
}

fn tail(names: &[String], n: usize) -> Vec<String> {
  names[names.len().saturating_sub(n)..].to_vec()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::BankItem;
  use crate::generator::GeneratedItem;
  use crate::round::tests::difficulty;
  use crate::domain::RoundRecord;
  use crate::error::StoreError;
  use crate::session::SessionSummary;
  use crate::store::{GlobalStats, MemoryStore, PlayerStats};
  use async_trait::async_trait;
  use std::collections::VecDeque;
  use std::time::Duration;

  /// Replays scripted results; an exhausted script behaves like a hung model.
  struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<&'static str, GenerationError>>>,
    seen: Mutex<Vec<GenerationRequest>>,
  }

  impl ScriptedGenerator {
    fn new(script: Vec<Result<&'static str, GenerationError>>) -> Arc<Self> {
      Arc::new(Self { script: Mutex::new(script.into()), seen: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<GenerationRequest> {
      self.seen.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl ItemGenerator for ScriptedGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedItem, GenerationError> {
      self.seen.lock().unwrap().push(req.clone());
      let next = self.script.lock().unwrap().pop_front();
      match next {
        Some(Ok(name)) => Ok(GeneratedItem {
          name: name.to_string(),
          facts: (1..=5).map(|i| format!("{name} fact {i}")).collect(),
          usage: None,
          latency: Duration::from_millis(5),
        }),
        Some(Err(e)) => Err(e),
        None => {
          tokio::time::sleep(Duration::from_secs(3600)).await;
          Err(GenerationError::Request("unreachable".into()))
        }
      }
    }

    fn model_name(&self) -> &str {
      "scripted"
    }
  }

  fn request(language: Language) -> SourceRequest {
    SourceRequest {
      category: "Animals".into(),
      subcategory: Some("birds".into()),
      difficulty: difficulty(1.2),
      language,
      session_key: Some("s1".into()),
      player_name: Some("Ada".into()),
    }
  }

  fn sourcer(generator: Option<Arc<ScriptedGenerator>>, store: Arc<MemoryStore>) -> ContentSourcer {
    ContentSourcer::new(generator.map(|g| g as Arc<dyn ItemGenerator>), store, SourcingSettings::default())
  }

  async fn seed_recent(store: &MemoryStore, name: &str) {
    let item = Item {
      name: name.into(),
      facts: vec!["x".into(); 5],
      question_id: None,
      category: Some("Animals".into()),
      subcategory: Some("birds".into()),
      source: ItemSource::Generated,
    };
    let meta = ItemMetadata { language: Language::En, ..Default::default() };
    store.save_generated_item(&item, &meta).await.unwrap();
  }

  fn bank(name: &str, language: Language) -> BankItem {
    BankItem {
      name: name.into(),
      category: "Animals".into(),
      subcategory: None,
      difficulty: Some("normal".into()),
      language,
      facts: vec!["f".into(); 5],
    }
  }

  #[tokio::test]
  async fn first_unique_item_is_saved_and_returned() {
    let store = Arc::new(MemoryStore::new());
    let generator = ScriptedGenerator::new(vec![Ok("Kiwi")]);
    let s = sourcer(Some(generator.clone()), store.clone());

    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Kiwi");
    assert_eq!(out.item.source, ItemSource::Generated);
    assert_eq!(out.attempts, 1);
    assert!(out.item.question_id.is_some());
    assert!(store.find_recent_item("kiwi", "animals", Language::En, Some(72)).await.unwrap());
    assert_eq!(generator.requests()[0].temperature, 0.9);
  }

  #[tokio::test]
  async fn duplicates_are_retried_with_escalating_temperature() {
    let store = Arc::new(MemoryStore::new());
    seed_recent(&store, "Owl").await;
    let generator = ScriptedGenerator::new(vec![Ok("Owl"), Ok("Kiwi")]);
    let s = sourcer(Some(generator.clone()), store);

    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Kiwi");
    assert_eq!(out.attempts, 2);
    assert!(!out.duplicate_accepted);

    let reqs = generator.requests();
    assert_eq!(reqs.len(), 2);
    assert!(reqs[0].avoid.contains(&"Owl".to_string()));
    assert!(reqs[1].temperature > reqs[0].temperature);
    assert!(reqs[1].temperature <= 1.0);
    assert_eq!(reqs[1].attempt, 1);
  }

  #[tokio::test]
  async fn duplicate_on_final_attempt_is_accepted() {
    let store = Arc::new(MemoryStore::new());
    seed_recent(&store, "Owl").await;
    let generator = ScriptedGenerator::new(vec![Ok("Owl"); 5]);
    let s = sourcer(Some(generator.clone()), store);

    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Owl");
    assert_eq!(out.attempts, 5);
    assert!(out.duplicate_accepted);
    assert_eq!(generator.requests().len(), 5);
  }

  #[tokio::test]
  async fn malformed_responses_are_retried() {
    let store = Arc::new(MemoryStore::new());
    let generator = ScriptedGenerator::new(vec![Err(GenerationError::Malformed("4 facts".into())), Ok("Kiwi")]);
    let s = sourcer(Some(generator.clone()), store);
    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Kiwi");
    assert_eq!(out.attempts, 2);
  }

  #[tokio::test]
  async fn request_failure_falls_back_to_store_immediately() {
    let store = Arc::new(MemoryStore::new());
    store.load_bank(&[bank("Penguin", Language::En)]).await.unwrap();
    let generator = ScriptedGenerator::new(vec![Err(GenerationError::Request("HTTP 500".into())), Ok("Kiwi")]);
    let s = sourcer(Some(generator.clone()), store);

    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Penguin");
    assert_eq!(out.item.source, ItemSource::Store);
    assert_eq!(generator.requests().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn timeouts_count_as_attempts_then_fall_back() {
    let store = Arc::new(MemoryStore::new());
    let generator = ScriptedGenerator::new(Vec::new());
    let s = sourcer(Some(generator.clone()), store);

    let out = s.source_item(&request(Language::Pl)).await;
    assert!(out.item.is_error());
    assert_eq!(out.attempts, 5);
    assert_eq!(out.item.facts.len(), 3);
    assert_eq!(out.item.name, Language::Pl.locale().generation_error_item().0);
  }

  #[tokio::test]
  async fn no_generator_uses_store_then_error_item() {
    let store = Arc::new(MemoryStore::new());
    let s = sourcer(None, store.clone());
    let out = s.source_item(&request(Language::En)).await;
    assert!(out.item.is_error());
    assert_eq!(out.attempts, 0);

    store.load_bank(&[bank("Penguin", Language::En)]).await.unwrap();
    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Penguin");
  }

  #[tokio::test]
  async fn unreachable_store_uses_local_tracking_for_duplicates() {
    let store = Arc::new(MemoryStore::new());
    let generator = ScriptedGenerator::new(vec![Ok("Kiwi"), Ok("Kiwi"), Ok("Emu")]);
    let s = sourcer(Some(generator.clone()), store.clone());
    store.set_available(false);

    assert_eq!(s.source_item(&request(Language::En)).await.item.name, "Kiwi");
    let second = s.source_item(&request(Language::En)).await;
    assert_eq!(second.item.name, "Emu");
    assert_eq!(second.item.question_id, None);
    assert!(generator.requests()[1].avoid.contains(&"Kiwi".to_string()));
  }

  #[tokio::test]
  async fn reset_forgets_locally_tracked_names() {
    let store = Arc::new(MemoryStore::new());
    let generator = ScriptedGenerator::new(vec![Ok("Kiwi"), Ok("Kiwi")]);
    let s = sourcer(Some(generator.clone()), store.clone());
    store.set_available(false);

    s.source_item(&request(Language::En)).await;
    s.reset_tracking();
    let again = s.source_item(&request(Language::En)).await;
    assert_eq!(again.item.name, "Kiwi");
    assert_eq!(again.attempts, 1);
    assert!(generator.requests()[1].avoid.is_empty());
  }

  #[tokio::test]
  async fn offline_consume_marks_used_and_reports_exhaustion() {
    let store = Arc::new(MemoryStore::new());
    store.load_bank(&[bank("Penguin", Language::En)]).await.unwrap();
    let s = sourcer(None, store);

    let item = s.source_offline(Some("animals"), None, Language::En, OfflineMode::Consume).await.unwrap();
    assert_eq!(item.name, "Penguin");
    assert_eq!(item.source, ItemSource::Offline);

    let status = s.offline_status(Some("animals"), None, Language::En).await;
    assert_eq!(status, OfflineStatus { total: 1, unused: 0, used: 1, offline_available: false });

    assert_eq!(
      s.source_offline(Some("animals"), None, Language::En, OfflineMode::Consume).await.unwrap_err(),
      SourcingError::NoOfflineContent { available: 0 }
    );
    // replay ignores the used flag
    assert!(s.source_offline(Some("animals"), None, Language::En, OfflineMode::Replay).await.is_ok());
  }

  #[tokio::test]
  async fn offline_filters_by_language() {
    let store = Arc::new(MemoryStore::new());
    store.load_bank(&[bank("Pingwin", Language::Pl)]).await.unwrap();
    let s = sourcer(None, store.clone());
    assert!(matches!(
      s.source_offline(None, None, Language::En, OfflineMode::Replay).await,
      Err(SourcingError::NoOfflineContent { .. })
    ));
    assert_eq!(s.source_offline(None, None, Language::Pl, OfflineMode::Replay).await.unwrap().name, "Pingwin");

    store.set_available(false);
    assert!(matches!(
      s.source_offline(None, None, Language::Pl, OfflineMode::Replay).await,
      Err(SourcingError::NoOfflineContent { .. })
    ));
  }

  /// Delegates to a memory store; item saves take `delay`.
  struct SlowSaves {
    inner: Arc<MemoryStore>,
    delay: Duration,
  }

  #[async_trait]
  impl ItemStore for SlowSaves {
    async fn is_available(&self) -> bool {
      self.inner.is_available().await
    }
    async fn load_bank(&self, bank: &[BankItem]) -> Result<usize, StoreError> {
      self.inner.load_bank(bank).await
    }
    async fn find_recent_item(&self, name: &str, category: &str, language: Language, window: Option<u32>) -> Result<bool, StoreError> {
      self.inner.find_recent_item(name, category, language, window).await
    }
    async fn list_recent_items(
      &self,
      category: &str,
      subcategory: Option<&str>,
      language: Language,
      window_hours: u32,
      limit: usize,
    ) -> Result<Vec<String>, StoreError> {
      self.inner.list_recent_items(category, subcategory, language, window_hours, limit).await
    }
    async fn save_generated_item(&self, item: &Item, meta: &ItemMetadata) -> Result<i64, StoreError> {
      tokio::time::sleep(self.delay).await;
      self.inner.save_generated_item(item, meta).await
    }
    async fn count_offline_items(&self, query: &OfflineQuery) -> Result<u64, StoreError> {
      self.inner.count_offline_items(query).await
    }
    async fn fetch_random_offline_item(&self, query: &OfflineQuery) -> Result<Option<Item>, StoreError> {
      self.inner.fetch_random_offline_item(query).await
    }
    async fn mark_used(&self, id: i64) -> Result<bool, StoreError> {
      self.inner.mark_used(id).await
    }
    async fn save_round(&self, record: &RoundRecord, session_id: Option<i64>) -> Result<bool, StoreError> {
      self.inner.save_round(record, session_id).await
    }
    async fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError> {
      self.inner.save_session(summary).await
    }
    async fn top_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
      self.inner.top_sessions(limit).await
    }
    async fn player_sessions(&self, player_name: &str, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
      self.inner.player_sessions(player_name, limit).await
    }
    async fn player_stats(&self, player_name: &str, limit: usize) -> Result<PlayerStats, StoreError> {
      self.inner.player_stats(player_name, limit).await
    }
    async fn global_stats(&self) -> Result<GlobalStats, StoreError> {
      self.inner.global_stats().await
    }
  }

  #[tokio::test(start_paused = true)]
  async fn slow_item_save_does_not_hold_the_round() {
    let store = Arc::new(MemoryStore::new());
    let slow = Arc::new(SlowSaves { inner: store.clone(), delay: Duration::from_secs(10) });
    let generator = ScriptedGenerator::new(vec![Ok("Kiwi")]);
    let s = ContentSourcer::new(Some(generator as Arc<dyn ItemGenerator>), slow, SourcingSettings::default());

    let started = tokio::time::Instant::now();
    let out = s.source_item(&request(Language::En)).await;
    assert_eq!(out.item.name, "Kiwi");
    assert_eq!(out.item.question_id, None);
    let waited = started.elapsed();
    assert!(waited >= SourcingSettings::default().save_timeout() && waited < Duration::from_secs(3));

    // the save still lands in the background
    assert!(!store.find_recent_item("Kiwi", "Animals", Language::En, None).await.unwrap());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(store.find_recent_item("Kiwi", "Animals", Language::En, None).await.unwrap());
  }
}
