//! Minimal OpenAI client for item generation.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::error::GenerationError;
use crate::generator::{parse_generated_item, GeneratedItem, GenerationRequest, ItemGenerator, TokenUsage};
use crate::util::{fill_template, trunc_for_log};

const MAX_TOKENS: u32 = 500;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
  pub timeout: Duration,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  /// The per-call timeout is enforced here as well as by the sourcing policy.
  pub fn from_env(prompts: Prompts, timeout: Duration) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    Self::new(api_key, base_url, model, prompts, timeout)
  }

  pub fn new(api_key: String, base_url: String, model: String, prompts: Prompts, timeout: Duration) -> Option<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build().ok()?;
    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, prompts, timeout })
  }

  /// JSON-object chat completion. Returns the raw message text plus token usage.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<(String, Option<TokenUsage>), GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(MAX_TOKENS),
    };

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "guessr-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| self.transport_error(e))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Request(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let usage = body.usage.as_ref().map(|u| {
      info!(prompt_tokens = ?u.prompt_tokens, completion_tokens = ?u.completion_tokens, total_tokens = ?u.total_tokens, "OpenAI usage");
      TokenUsage {
        prompt_tokens: u.prompt_tokens.unwrap_or(0),
        completion_tokens: u.completion_tokens.unwrap_or(0),
      }
    });
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();
    debug!(response_len = text.len(), preview = %trunc_for_log(&text, 80), "OpenAI response");
    Ok((text, usage))
  }

  fn transport_error(&self, e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
      GenerationError::Timeout(self.timeout)
    } else {
      GenerationError::Request(e.to_string())
    }
  }
}

/// Fills the user prompt for one attempt.
pub fn build_user_prompt(prompts: &Prompts, req: &GenerationRequest) -> String {
  let subcategory = match &req.subcategory {
    Some(s) if !s.is_empty() => fill_template(&prompts.subcategory_template, &[("subcategory", s)]),
    _ => String::new(),
  };
  let avoid = if req.avoid.is_empty() {
    String::new()
  } else {
    fill_template(&prompts.avoid_template, &[("items", &req.avoid.join(", "))])
  };
  let retry = if req.attempt > 0 {
    fill_template(&prompts.retry_template, &[("attempt", &(req.attempt + 1).to_string())])
  } else {
    String::new()
  };
  fill_template(
    &prompts.generation_user_template,
    &[
      ("category", &req.category),
      ("subcategory", &subcategory),
      ("language", req.language.english_name()),
      ("difficulty_hint", &req.difficulty_hint),
      ("avoid", &avoid),
      ("retry", &retry),
    ],
  )
}

#[async_trait]
impl ItemGenerator for OpenAI {
  #[instrument(
    level = "info",
    skip(self, req),
    fields(category = %req.category, attempt = req.attempt, temperature = req.temperature, avoid = req.avoid.len())
  )]
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedItem, GenerationError> {
    let user = build_user_prompt(&self.prompts, req);
    let start = Instant::now();
    let result = self.chat_json(&self.prompts.generation_system, &user, req.temperature).await;
    let latency = start.elapsed();

    let (text, usage) = match result {
      Ok(r) => {
        info!(?latency, "Model response received successfully");
        r
      }
      Err(e) => {
        error!(?latency, error = %e, "Model call failed during item generation");
        return Err(e);
      }
    };

    let (name, facts) = parse_generated_item(&text)?;
    Ok(GeneratedItem { name, facts, usage, latency })
  }

  fn model_name(&self) -> &str {
    &self.model
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::locale::Language;
  use axum::{routing::post, Json, Router};
  use serde_json::{json, Value};

  fn request(attempt: u32, avoid: Vec<String>) -> GenerationRequest {
    GenerationRequest {
      category: "Animals".into(),
      subcategory: Some("birds".into()),
      language: Language::Pl,
      difficulty_hint: "Be subtle.".into(),
      avoid,
      attempt,
      temperature: 0.9,
    }
  }

  #[test]
  fn first_attempt_prompt_has_no_retry_section() {
    let p = build_user_prompt(&Prompts::default(), &request(0, Vec::new()));
    assert!(p.contains("category of Animals (specifically related to birds)"));
    assert!(p.contains("in Polish"));
    assert!(p.contains("Difficulty guideline: Be subtle."));
    assert!(!p.contains("ATTEMPT"));
    assert!(!p.contains("recently used"));
  }

  #[test]
  fn retry_prompt_lists_avoided_items() {
    let p = build_user_prompt(&Prompts::default(), &request(2, vec!["Owl".into(), "Eagle".into()]));
    assert!(p.contains("recently used items: Owl, Eagle"));
    assert!(p.contains("ATTEMPT 3"));
  }

  #[test]
  fn extracts_api_error_message() {
    let body = r#"{"error": {"message": "quota exceeded", "type": "x"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("quota exceeded"));
    assert_eq!(extract_openai_error("nope"), None);
  }

  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
  }

  #[tokio::test]
  async fn generates_against_a_chat_completions_endpoint() {
    let router = Router::new().route(
      "/chat/completions",
      post(|Json(body): Json<Value>| async move {
        assert_eq!(body["response_format"]["type"], "json_object");
        let content = r#"{"name": "Kiwi", "facts": ["I am a bird.", "I cannot fly.", "I am nocturnal.", "I live in New Zealand.", "I share a name with a fruit."]}"#;
        Json(json!({
          "choices": [{ "message": { "content": content } }],
          "usage": { "prompt_tokens": 120, "completion_tokens": 60, "total_tokens": 180 }
        }))
      }),
    );
    let base = serve(router).await;
    let oa = OpenAI::new("k".into(), base, "test-model".into(), Prompts::default(), Duration::from_secs(5)).unwrap();

    let item = oa.generate(&request(0, Vec::new())).await.unwrap();
    assert_eq!(item.name, "Kiwi");
    assert_eq!(item.facts.len(), 5);
    assert_eq!(item.usage, Some(TokenUsage { prompt_tokens: 120, completion_tokens: 60 }));
    assert_eq!(oa.model_name(), "test-model");
  }

  #[tokio::test]
  async fn http_errors_are_not_retryable() {
    let router = Router::new().route(
      "/chat/completions",
      post(|| async {
        (axum::http::StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": { "message": "slow down" } })))
      }),
    );
    let base = serve(router).await;
    let oa = OpenAI::new("k".into(), base, "m".into(), Prompts::default(), Duration::from_secs(5)).unwrap();
    let err = oa.generate(&request(0, Vec::new())).await.unwrap_err();
    assert!(matches!(err, GenerationError::Request(ref m) if m.contains("slow down")));
    assert!(!err.is_retryable());
  }
}
