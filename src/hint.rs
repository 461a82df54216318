//! Letter hints: a masked view of the answer that reveals one random letter per hint.
//!
//! Positions are char indices into the answer string. Only alphabetic chars are
//! ever masked or revealed; spaces and punctuation always render as-is.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::GameError;

pub const DEFAULT_MAX_HINTS: u32 = 3;
pub const PLACEHOLDER: char = '_';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintReveal {
  pub position: usize,
  pub display: String,
  pub hints_used: u32,
  pub hints_remaining: u32,
}

#[derive(Clone, Debug)]
pub struct HintTracker {
  revealed: BTreeSet<usize>,
  hints_used: u32,
  max_hints: u32,
}

impl HintTracker {
  pub fn new(max_hints: u32) -> Self {
    Self { revealed: BTreeSet::new(), hints_used: 0, max_hints }
  }

  pub fn hints_used(&self) -> u32 {
    self.hints_used
  }

  pub fn max_hints(&self) -> u32 {
    self.max_hints
  }

  pub fn hints_remaining(&self) -> u32 {
    self.max_hints.saturating_sub(self.hints_used)
  }

  #[cfg(test)]
  pub(crate) fn revealed_positions(&self) -> &BTreeSet<usize> {
    &self.revealed
  }

  pub fn reveal(&mut self, answer: &str) -> Result<HintReveal, GameError> {
    self.reveal_with(answer, &mut rand::thread_rng())
  }

  pub fn reveal_with<R: Rng + ?Sized>(&mut self, answer: &str, rng: &mut R) -> Result<HintReveal, GameError> {
    if self.hints_used >= self.max_hints {
      return Err(GameError::HintsExhausted);
    }
    let hidden: Vec<usize> = answer
      .chars()
      .enumerate()
      .filter(|(i, c)| c.is_alphabetic() && !self.revealed.contains(i))
      .map(|(i, _)| i)
      .collect();
    let Some(&position) = hidden.choose(rng) else {
      return Err(GameError::NoLettersLeft);
    };

    self.revealed.insert(position);
    self.hints_used += 1;
    Ok(HintReveal {
      position,
      display: self.display(answer),
      hints_used: self.hints_used,
      hints_remaining: self.hints_remaining(),
    })
  }

  /// Current masked answer. Pure: never consumes a hint.
  pub fn display(&self, answer: &str) -> String {
    let mut out = String::with_capacity(answer.len());
    for (i, c) in answer.chars().enumerate() {
      if !c.is_alphabetic() {
        out.push(c);
      } else if self.revealed.contains(&i) {
        out.extend(c.to_uppercase());
      } else {
        out.push(PLACEHOLDER);
      }
    }
    out
  }

  /// Display for clients: empty until the first letter has been revealed.
  pub fn current_display(&self, answer: &str) -> String {
    if self.revealed.is_empty() {
      String::new()
    } else {
      self.display(answer)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn masks_letters_and_keeps_punctuation() {
    let t = HintTracker::new(3);
    assert_eq!(t.display("New York, NY"), "___ ____, __");
  }

  #[test]
  fn never_reveals_twice_and_caps_at_max() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut t = HintTracker::new(3);
    let answer = "Mount Kilimanjaro";
    let mut seen = BTreeSet::new();
    for n in 1..=3 {
      let r = t.reveal_with(answer, &mut rng).expect("hint available");
      assert!(seen.insert(r.position), "position {} revealed twice", r.position);
      assert_eq!(r.hints_used, n);
      assert_eq!(r.hints_remaining, 3 - n);
      assert!(answer.chars().nth(r.position).is_some_and(char::is_alphabetic));
    }
    assert_eq!(t.reveal_with(answer, &mut rng), Err(GameError::HintsExhausted));
    assert_eq!(t.hints_used(), 3);
    assert_eq!(t.revealed_positions(), &seen);
  }

  #[test]
  fn fails_when_every_letter_is_visible() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut t = HintTracker::new(3);
    t.reveal_with("O-x", &mut rng).unwrap();
    t.reveal_with("O-x", &mut rng).unwrap();
    assert_eq!(t.display("O-x"), "O-X");
    assert_eq!(t.reveal_with("O-x", &mut rng), Err(GameError::NoLettersLeft));
    assert_eq!(t.hints_used(), 2);
  }

  #[test]
  fn display_is_idempotent() {
    let mut t = HintTracker::new(3);
    assert_eq!(t.current_display("Paris"), "");
    t.reveal("Paris").unwrap();
    let first = t.display("Paris");
    assert_eq!(first, t.display("Paris"));
    assert_eq!(first, t.current_display("Paris"));
    assert_eq!(first.chars().filter(|c| *c == PLACEHOLDER).count(), 4);
    assert_eq!(t.hints_used(), 1);
  }

  #[test]
  fn uppercases_non_ascii_letters() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut t = HintTracker::new(1);
    t.reveal_with("ł", &mut rng).unwrap();
    assert_eq!(t.display("ł"), "Ł");
  }
}
