//! Category and difficulty catalogs.
//!
//! Both are built once from configuration. The only mutable piece is the
//! per-process subcategory usage counter, which is best-effort and resettable.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::domain::{Category, DifficultyLevel};
use crate::locale::Language;
use crate::seeds::default_difficulty_levels;

pub const DEFAULT_DIFFICULTY: &str = "normal";

/// A chosen subcategory: the English key (what usage is counted by) and its
/// localized form (what goes into prompts and responses).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubcategoryPick {
  pub english: String,
  pub localized: String,
}

pub struct CategoryCatalog {
  categories: Vec<Category>,
  // category name (lowercase) -> subcategory -> times chosen
  usage: Mutex<HashMap<String, HashMap<String, u32>>>,
}

impl CategoryCatalog {
  pub fn new(categories: Vec<Category>) -> Self {
    Self { categories, usage: Mutex::new(HashMap::new()) }
  }

  pub fn all(&self) -> &[Category] {
    &self.categories
  }

  pub fn len(&self) -> usize {
    self.categories.len()
  }

  /// Case-insensitive lookup by English or any translated name.
  pub fn find(&self, name: &str) -> Option<&Category> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
      return None;
    }
    self.categories.iter().find(|c| {
      c.name.to_lowercase() == needle || c.translations.values().any(|t| t.name.to_lowercase() == needle)
    })
  }

  pub fn random_category(&self) -> Option<&Category> {
    self.categories.choose(&mut rand::thread_rng())
  }

  pub fn pick_subcategory(&self, category: &Category, lang: Language) -> Option<SubcategoryPick> {
    self.pick_subcategory_with(category, lang, &mut rand::thread_rng())
  }

  /// Prefers examples never chosen before; once all are used, one of the least used.
  pub fn pick_subcategory_with<R: Rng + ?Sized>(
    &self,
    category: &Category,
    lang: Language,
    rng: &mut R,
  ) -> Option<SubcategoryPick> {
    if category.examples.is_empty() {
      return None;
    }
    let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
    let counts = usage.entry(category.name.to_lowercase()).or_default();

    let unused: Vec<&String> = category.examples.iter().filter(|e| !counts.contains_key(*e)).collect();
    let pick = if unused.is_empty() {
      let min = category.examples.iter().filter_map(|e| counts.get(e)).min().copied().unwrap_or(0);
      let least: Vec<&String> =
        category.examples.iter().filter(|e| counts.get(*e).copied().unwrap_or(0) == min).collect();
      least.choose(rng).map(|s| (*s).clone())
    } else {
      unused.choose(rng).map(|s| (*s).clone())
    };
    let chosen = pick?;

    *counts.entry(chosen.clone()).or_insert(0) += 1;
    debug!(target: "sourcing", category = %category.name, subcategory = %chosen, "Subcategory picked");
    Some(SubcategoryPick { localized: category.localized_example(&chosen, lang), english: chosen })
  }

  #[cfg(test)]
  pub(crate) fn usage_count(&self, category: &str, subcategory: &str) -> u32 {
    let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
    usage.get(&category.to_lowercase()).and_then(|m| m.get(subcategory)).copied().unwrap_or(0)
  }

  pub fn reset_usage(&self) {
    self.usage.lock().unwrap_or_else(|e| e.into_inner()).clear();
  }
}

pub struct DifficultyCatalog {
  levels: Vec<DifficultyLevel>,
}

impl DifficultyCatalog {
  /// Ordered by multiplier. `normal` is added from the built-in levels if missing.
  pub fn new(mut levels: Vec<DifficultyLevel>) -> Self {
    if !levels.iter().any(|l| l.name == DEFAULT_DIFFICULTY) {
      if let Some(normal) = default_difficulty_levels().into_iter().find(|l| l.name == DEFAULT_DIFFICULTY) {
        levels.push(normal);
      }
    }
    levels.sort_by(|a, b| a.score_multiplier.total_cmp(&b.score_multiplier));
    Self { levels }
  }

  pub fn all(&self) -> &[DifficultyLevel] {
    &self.levels
  }

  pub fn find(&self, name: &str) -> Option<&DifficultyLevel> {
    let name = name.trim().to_lowercase().replace(' ', "_");
    self.levels.iter().find(|l| l.name == name)
  }

  /// Unknown or empty names resolve to `normal`.
  pub fn resolve(&self, name: Option<&str>) -> DifficultyLevel {
    name
      .and_then(|n| self.find(n))
      .or_else(|| self.find(DEFAULT_DIFFICULTY))
      .cloned()
      .unwrap_or_else(crate::seeds::normal_difficulty)
  }
}
