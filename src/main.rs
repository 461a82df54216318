//! Guessr · Guessing Game Backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI item generation (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   CATEGORIES_PATH   : categories TOML (default config/categories.toml), required
//!   GAME_CONFIG_PATH  : rules, sourcing, sessions, store, prompts, difficulties, item bank (default config/game.toml)
//!   DATABASE_PATH     : SQLite file (default data/guessr.db)
//!   OPENAI_API_KEY    : enables item generation if present
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : default "gpt-4o"
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod locale;
mod domain;
mod config;
mod catalog;
mod matcher;
mod hint;
mod scoring;
mod round;
mod session;
mod registry;
mod generator;
mod openai;
mod store;
mod seeds;
mod sourcing;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Categories are mandatory; everything else has defaults.
  let config = config::load_from_env().map_err(|e| {
    error!(target: "guessr_backend", error = %e, "Cannot start without categories");
    e
  })?;

  let session_settings = config.settings.sessions.clone();
  let state = Arc::new(AppState::new(config).await);
  tokio::spawn(logic::run_session_sweeper(state.clone(), session_settings));
  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "guessr_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
