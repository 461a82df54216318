//! Built-in content that keeps the game usable without a game config file:
//! the five standard difficulty levels and the localized error placeholder item.

use std::collections::HashMap;

use crate::domain::{DifficultyLevel, Item, ItemSource, LocalizedText};
use crate::locale::Locale;

struct LevelSeed {
  name: &'static str,
  multiplier: f64,
  hint_penalty: u32,
  en: (&'static str, &'static str),
  pl: (&'static str, &'static str),
  prompt_hint: &'static str,
}

const LEVELS: [LevelSeed; 5] = [
  LevelSeed {
    name: "very_easy",
    multiplier: 0.8,
    hint_penalty: 25,
    en: ("Very Easy", "Easiest puzzles with very obvious clues, reduced scoring"),
    pl: ("Bardzo łatwy", "Najłatwiejsze zagadki z oczywistymi wskazówkami, zmniejszone punktowanie"),
    prompt_hint: "Make the facts extremely obvious and straightforward, with very clear hints from the beginning. Perfect for children or absolute beginners.",
  },
  LevelSeed {
    name: "easy",
    multiplier: 1.0,
    hint_penalty: 50,
    en: ("Easy", "Simpler puzzles, normal scoring"),
    pl: ("Łatwy", "Prostsze zagadki, normalne punktowanie"),
    prompt_hint: "Make the facts very straightforward and obvious, suitable for beginners.",
  },
  LevelSeed {
    name: "normal",
    multiplier: 1.2,
    hint_penalty: 75,
    en: ("Normal", "Standard puzzle difficulty, increased scoring"),
    pl: ("Normalny", "Standardowy poziom zagadek, zwiększone punktowanie"),
    prompt_hint: "Balance the facts between obvious and subtle hints, suitable for average players.",
  },
  LevelSeed {
    name: "hard",
    multiplier: 1.5,
    hint_penalty: 100,
    en: ("Hard", "More challenging puzzles, significantly increased scoring"),
    pl: ("Trudny", "Bardziej wymagające zagadki, znacznie zwiększone punktowanie"),
    prompt_hint: "Make the facts more subtle and clever, requiring good deduction skills. Avoid very obvious hints until the final fact.",
  },
  LevelSeed {
    name: "expert",
    multiplier: 2.0,
    hint_penalty: 150,
    en: ("Expert", "Hardest puzzles with cryptic clues, maximum scoring"),
    pl: ("Ekspert", "Najtrudniejsze zagadki z zawoalowanymi wskazówkami, maksymalne punktowanie"),
    prompt_hint: "Make the facts very cryptic, abstract, and challenging. Use metaphors, indirect references, and require deep thinking. Only the final fact should be somewhat direct.",
  },
];

fn level(seed: &LevelSeed) -> DifficultyLevel {
  let mut display = HashMap::new();
  display.insert("en".to_string(), LocalizedText { name: seed.en.0.into(), description: seed.en.1.into() });
  display.insert("pl".to_string(), LocalizedText { name: seed.pl.0.into(), description: seed.pl.1.into() });
  DifficultyLevel {
    name: seed.name.into(),
    score_multiplier: seed.multiplier,
    hint_penalty: seed.hint_penalty,
    prompt_hint: seed.prompt_hint.into(),
    display,
  }
}

pub fn default_difficulty_levels() -> Vec<DifficultyLevel> {
  LEVELS.iter().map(level).collect()
}

pub fn normal_difficulty() -> DifficultyLevel {
  level(&LEVELS[2])
}

/// Placeholder returned when neither generation nor the store produced an item.
/// Its facts explain the failure; it must never be played as a real round.
pub fn generation_error_item(locale: Locale, category: Option<&str>) -> Item {
  let (name, facts) = locale.generation_error_item();
  Item {
    name,
    facts,
    question_id: None,
    category: category.map(str::to_string),
    subcategory: None,
    source: ItemSource::Error,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::locale::Language;

  #[test]
  fn normal_is_part_of_defaults() {
    let levels = default_difficulty_levels();
    assert_eq!(levels.len(), 5);
    let normal = normal_difficulty();
    assert_eq!(normal.name, "normal");
    assert_eq!(normal.score_multiplier, 1.2);
    assert_eq!(normal.display_name(Language::Pl), "Normalny");
  }

  #[test]
  fn error_item_is_flagged_and_localized() {
    let en = generation_error_item(Language::En.locale(), Some("animals"));
    let pl = generation_error_item(Language::Pl.locale(), None);
    assert!(en.is_error() && pl.is_error());
    assert_eq!(en.facts.len(), 3);
    assert_ne!(en.name, pl.name);
  }
}
