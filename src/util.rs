//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Pull the payload out of a Markdown code fence if the model wrapped its answer in one.
/// Prefers a ```json fence, then any fence, else returns the trimmed input.
pub fn strip_code_fence(raw: &str) -> &str {
  let s = raw.trim();
  let body = if let Some((_, rest)) = s.split_once("```json") {
    rest
  } else if let Some((_, rest)) = s.split_once("```") {
    rest
  } else {
    return s;
  };
  match body.split_once("```") {
    Some((inner, _)) => inner.trim(),
    None => body.trim(),
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
