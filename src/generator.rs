//! Item generator interface and response parsing.
//!
//! A generator turns a `GenerationRequest` into a candidate item. It does not
//! decide about duplicates, retries or fallbacks; the sourcing policy does.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GenerationError;
use crate::locale::Language;
use crate::util::strip_code_fence;

pub const FACTS_PER_ITEM: usize = 5;

#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub category: String,
  pub subcategory: Option<String>,
  pub language: Language,
  pub difficulty_hint: String,
  /// Already trimmed to the most recent names.
  pub avoid: Vec<String>,
  /// Zero-based.
  pub attempt: u32,
  pub temperature: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
  pub prompt_tokens: u32,
  pub completion_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct GeneratedItem {
  pub name: String,
  pub facts: Vec<String>,
  pub usage: Option<TokenUsage>,
  pub latency: Duration,
}

#[async_trait]
pub trait ItemGenerator: Send + Sync {
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedItem, GenerationError>;

  /// Recorded with persisted items.
  fn model_name(&self) -> &str;
}

#[derive(Deserialize)]
struct RawItem {
  name: String,
  facts: Vec<String>,
}

/// Parses the generator's text into `(name, facts)`. Accepts fenced JSON.
pub fn parse_generated_item(text: &str) -> Result<(String, Vec<String>), GenerationError> {
  let body = strip_code_fence(text);
  if body.is_empty() {
    return Err(GenerationError::Malformed("empty response".into()));
  }
  let raw: RawItem = serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

  let name = raw.name.trim().to_string();
  if name.is_empty() {
    return Err(GenerationError::Malformed("empty item name".into()));
  }
  let facts: Vec<String> = raw.facts.into_iter().map(|f| f.trim().to_string()).collect();
  if facts.len() != FACTS_PER_ITEM {
    return Err(GenerationError::Malformed(format!("expected {FACTS_PER_ITEM} facts, got {}", facts.len())));
  }
  if facts.iter().any(String::is_empty) {
    return Err(GenerationError::Malformed("empty fact".into()));
  }
  Ok((name, facts))
}
