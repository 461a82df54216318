//! Application state: catalogs, the session registry, the content sourcer and
//! the store, assembled once at startup and shared behind an `Arc`.
//!
//! The generator is optional. Without `OPENAI_API_KEY` the game still runs on
//! the item bank (offline mode, store fallback) and the error placeholder.
//!
//! The store is the SQLite file from `[store] database_path` / `DATABASE_PATH`.
//! If it cannot be opened the game runs on an in-memory store instead.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::catalog::{CategoryCatalog, DifficultyCatalog};
use crate::config::GameConfig;
use crate::generator::ItemGenerator;
use crate::openai::OpenAI;
use crate::registry::SessionRegistry;
use crate::round::RoundSettings;
use crate::sourcing::ContentSourcer;
use crate::store::{best_effort, ItemStore, MemoryStore, SqliteStore};

pub struct AppState {
  pub categories: CategoryCatalog,
  pub difficulties: DifficultyCatalog,
  pub sessions: SessionRegistry,
  pub sourcer: ContentSourcer,
  pub store: Arc<dyn ItemStore>,
  pub round_settings: RoundSettings,
}

impl AppState {
  /// Build state from loaded config: SQLite store seeded with the item bank,
  /// OpenAI generator if the environment enables it.
  #[instrument(level = "info", skip_all)]
  pub async fn new(config: GameConfig) -> Self {
    let path = &config.settings.store.database_path;
    let store: Arc<dyn ItemStore> = match SqliteStore::open(path).await {
      Ok(sqlite) => Arc::new(sqlite),
      Err(e) => {
        error!(target: "guessr_backend", path = %path.display(), error = %e, "Database unavailable; falling back to in-memory store");
        Arc::new(MemoryStore::new())
      }
    };
    best_effort("load_bank", store.load_bank(&config.settings.items), 0).await;

    let openai = OpenAI::from_env(config.settings.prompts.clone(), config.settings.sourcing.generation_timeout());
    let generator: Option<Arc<dyn ItemGenerator>> = match openai {
      Some(oa) => {
        info!(target: "guessr_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        Some(Arc::new(oa))
      }
      None => {
        info!(target: "guessr_backend", "OpenAI disabled (no OPENAI_API_KEY). Serving stored content only.");
        None
      }
    };

    Self::from_parts(config, generator, store)
  }

  /// Assemble state around explicit collaborators.
  pub fn from_parts(config: GameConfig, generator: Option<Arc<dyn ItemGenerator>>, store: Arc<dyn ItemStore>) -> Self {
    let GameConfig { categories, settings } = config;
    let categories = CategoryCatalog::new(categories);
    let difficulties = DifficultyCatalog::new(settings.difficulty_levels());
    info!(
      target: "guessr_backend",
      categories = categories.len(),
      difficulties = difficulties.all().len(),
      generator = generator.is_some(),
      "Game state ready"
    );
    Self {
      categories,
      difficulties,
      sessions: SessionRegistry::new(),
      sourcer: ContentSourcer::new(generator, store.clone(), settings.sourcing.clone()),
      store,
      round_settings: settings.round_settings(),
    }
  }
}
