//! Active sessions keyed by session key.
//!
//! The map lock only guards inserts, lookups and removals. Each session sits
//! behind its own mutex so one session's requests are serialized without
//! blocking any other session.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::session::GameSession;

pub type SessionHandle = Arc<Mutex<GameSession>>;

#[derive(Default)]
pub struct SessionRegistry {
  sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a new session and returns its key.
  #[instrument(level = "debug", skip_all)]
  pub async fn insert(&self, session: GameSession) -> String {
    let key = session.key().to_string();
    let handle = Arc::new(Mutex::new(session));
    self.sessions.write().await.insert(key.clone(), handle);
    debug!(target: "session", session = %key, "Session registered");
    key
  }

  pub async fn get(&self, key: &str) -> Option<SessionHandle> {
    self.sessions.read().await.get(key).cloned()
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn remove(&self, key: &str) -> Option<SessionHandle> {
    let removed = self.sessions.write().await.remove(key);
    if removed.is_some() {
      debug!(target: "session", session = %key, "Session removed");
    }
    removed
  }

  /// Point-in-time copy of every entry; the map lock is released on return.
  pub async fn snapshot(&self) -> Vec<(String, SessionHandle)> {
    self.sessions.read().await.iter().map(|(k, h)| (k.clone(), h.clone())).collect()
  }

  pub async fn len(&self) -> usize {
    self.sessions.read().await.len()
  }
}
