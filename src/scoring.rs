//! Round scoring, session grades and achievement badges.
//!
//! Everything here is a pure function of round history; no I/O and no text
//! beyond the fixed badge labels.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::domain::{MatchType, RoundRecord};

#[derive(Clone, Copy, Debug)]
pub struct ScoringSystem {
  pub base_points: u32,
  pub fact_penalty: u32,
  pub guess_penalty: u32,
  pub similarity_bonus: u32,
  pub time_bonus_threshold: Duration,
  pub time_bonus_points: u32,
  pub minimum_points: u32,
}

impl Default for ScoringSystem {
  fn default() -> Self {
    Self {
      base_points: 1000,
      fact_penalty: 150,
      guess_penalty: 50,
      similarity_bonus: 100,
      time_bonus_threshold: Duration::from_secs(30),
      time_bonus_points: 200,
      minimum_points: 50,
    }
  }
}

/// What the scorer needs to know about a won round.
#[derive(Clone, Copy, Debug)]
pub struct ScoreInput {
  pub facts_shown: u32,
  /// Wrong guesses before the winning one.
  pub wrong_guesses: u32,
  pub match_type: MatchType,
  pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundScore {
  /// Score before the difficulty multiplier, floored at the minimum.
  pub base: u32,
  pub multiplier: f64,
  pub total: u32,
}

impl ScoringSystem {
  pub fn base_score(&self, input: &ScoreInput) -> u32 {
    // First fact is free; guessing before any fact earns no extra credit.
    let facts_penalty = i64::from(input.facts_shown.saturating_sub(1)) * i64::from(self.fact_penalty);
    let guesses_penalty = i64::from(input.wrong_guesses) * i64::from(self.guess_penalty);

    let mut score = i64::from(self.base_points) - facts_penalty - guesses_penalty;
    if input.match_type == MatchType::Exact {
      score += i64::from(self.similarity_bonus);
    }
    if input.elapsed <= self.time_bonus_threshold {
      score += i64::from(self.time_bonus_points);
    }
    score.max(i64::from(self.minimum_points)) as u32
  }

  /// Score for a won round with the difficulty multiplier applied (truncating).
  pub fn score_round(&self, input: &ScoreInput, multiplier: f64) -> RoundScore {
    let base = self.base_score(input);
    let total = (f64::from(base) * multiplier.max(0.0)).floor() as u32;
    RoundScore { base, multiplier, total }
  }

  pub fn grade_session(&self, rounds: &[RoundRecord]) -> Grade {
    let won = rounds.iter().filter(|r| r.correct).count();
    if won == 0 {
      return Grade::F;
    }
    let win_rate = won as f64 / rounds.len() as f64;
    let avg_facts = rounds.iter().map(|r| f64::from(r.facts_shown)).sum::<f64>() / rounds.len() as f64;
    let efficiency = 1.0 - (avg_facts - 1.0) / 4.0;
    Grade::from_performance((win_rate * 0.6 + efficiency * 0.4) * 100.0)
  }

  pub fn achievements(&self, rounds: &[RoundRecord]) -> Vec<Achievement> {
    let mut out = Vec::new();

    match max_consecutive_wins(rounds) {
      n if n >= 10 => out.push(Achievement::Unstoppable),
      n if n >= 5 => out.push(Achievement::OnFire),
      n if n >= 3 => out.push(Achievement::HotStreak),
      _ => {}
    }

    let quick = rounds.iter().filter(|r| r.correct && r.time_taken_secs <= 15.0).count();
    if quick >= 5 {
      out.push(Achievement::LightningFast);
    } else if quick >= 3 {
      out.push(Achievement::Speedy);
    }

    if rounds.iter().filter(|r| r.correct && r.facts_shown == 1).count() >= 3 {
      out.push(Achievement::MindReader);
    }
    if rounds.iter().filter(|r| r.correct && r.match_type == MatchType::Exact).count() >= 5 {
      out.push(Achievement::PerfectSpeller);
    }

    let mut per_category: BTreeMap<&str, usize> = BTreeMap::new();
    for r in rounds.iter().filter(|r| r.correct) {
      *per_category.entry(r.category.as_str()).or_default() += 1;
    }
    for (category, wins) in per_category {
      if wins >= 3 {
        out.push(Achievement::CategoryExpert(category.to_string()));
      }
    }

    if rounds.len() >= 5 && rounds.iter().all(|r| r.correct) {
      out.push(Achievement::FlawlessVictory);
    }
    out
  }
}

pub fn max_consecutive_wins(rounds: &[RoundRecord]) -> usize {
  let mut best = 0;
  let mut current = 0;
  for r in rounds {
    if r.correct {
      current += 1;
      best = best.max(current);
    } else {
      current = 0;
    }
  }
  best
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grade {
  APlus,
  A,
  AMinus,
  BPlus,
  B,
  BMinus,
  CPlus,
  C,
  CMinus,
  D,
  F,
}

impl Grade {
  pub fn from_performance(score: f64) -> Self {
    match score {
      s if s >= 90.0 => Grade::APlus,
      s if s >= 85.0 => Grade::A,
      s if s >= 80.0 => Grade::AMinus,
      s if s >= 75.0 => Grade::BPlus,
      s if s >= 70.0 => Grade::B,
      s if s >= 65.0 => Grade::BMinus,
      s if s >= 60.0 => Grade::CPlus,
      s if s >= 55.0 => Grade::C,
      s if s >= 50.0 => Grade::CMinus,
      s if s >= 45.0 => Grade::D,
      _ => Grade::F,
    }
  }

  pub const ALL: [Grade; 11] = [
    Grade::APlus,
    Grade::A,
    Grade::AMinus,
    Grade::BPlus,
    Grade::B,
    Grade::BMinus,
    Grade::CPlus,
    Grade::C,
    Grade::CMinus,
    Grade::D,
    Grade::F,
  ];

  pub fn parse(label: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|g| g.as_str() == label.trim())
  }

  pub const fn as_str(&self) -> &'static str {
    match self {
      Grade::APlus => "A+",
      Grade::A => "A",
      Grade::AMinus => "A-",
      Grade::BPlus => "B+",
      Grade::B => "B",
      Grade::BMinus => "B-",
      Grade::CPlus => "C+",
      Grade::C => "C",
      Grade::CMinus => "C-",
      Grade::D => "D",
      Grade::F => "F",
    }
  }
}

impl fmt::Display for Grade {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for Grade {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(self.as_str())
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Achievement {
  HotStreak,
  OnFire,
  Unstoppable,
  Speedy,
  LightningFast,
  MindReader,
  PerfectSpeller,
  CategoryExpert(String),
  FlawlessVictory,
}

impl Achievement {
  /// Stable identifier used when persisting; the label may change, this must not.
  pub fn code(&self) -> String {
    match self {
      Achievement::HotStreak => "hot_streak".into(),
      Achievement::OnFire => "on_fire".into(),
      Achievement::Unstoppable => "unstoppable".into(),
      Achievement::Speedy => "speedy".into(),
      Achievement::LightningFast => "lightning_fast".into(),
      Achievement::MindReader => "mind_reader".into(),
      Achievement::PerfectSpeller => "perfect_speller".into(),
      Achievement::CategoryExpert(category) => format!("category_expert:{category}"),
      Achievement::FlawlessVictory => "flawless_victory".into(),
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    if let Some(category) = code.strip_prefix("category_expert:") {
      return Some(Achievement::CategoryExpert(category.to_string()));
    }
    Some(match code {
      "hot_streak" => Achievement::HotStreak,
      "on_fire" => Achievement::OnFire,
      "unstoppable" => Achievement::Unstoppable,
      "speedy" => Achievement::Speedy,
      "lightning_fast" => Achievement::LightningFast,
      "mind_reader" => Achievement::MindReader,
      "perfect_speller" => Achievement::PerfectSpeller,
      "flawless_victory" => Achievement::FlawlessVictory,
      _ => return None,
    })
  }
}

impl fmt::Display for Achievement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Achievement::HotStreak => f.write_str("Hot Streak (3+ win streak)"),
      Achievement::OnFire => f.write_str("On Fire (5+ win streak)"),
      Achievement::Unstoppable => f.write_str("Unstoppable (10+ win streak)"),
      Achievement::Speedy => f.write_str("Speedy (3+ quick answers)"),
      Achievement::LightningFast => f.write_str("Lightning Fast (5+ quick answers)"),
      Achievement::MindReader => f.write_str("Mind Reader (3+ first-fact wins)"),
      Achievement::PerfectSpeller => f.write_str("Perfect Speller (5+ exact matches)"),
      Achievement::CategoryExpert(category) => write!(f, "{} Expert (3+ wins)", capitalize(category)),
      Achievement::FlawlessVictory => f.write_str("Flawless Victory (Perfect session)"),
    }
  }
}

impl Serialize for Achievement {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(self)
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) => c.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::domain::GameMode;
  use crate::locale::Language;

  pub(crate) fn record(category: &str, correct: bool, facts_shown: u32, secs: f64, match_type: MatchType) -> RoundRecord {
    RoundRecord {
      session_key: "s".into(),
      player_name: "Ada".into(),
      item_name: "Owl".into(),
      category: category.into(),
      subcategory: None,
      difficulty: "normal".into(),
      language: Language::En,
      question_id: None,
      facts_shown,
      total_facts: 5,
      hints_used: 0,
      max_hints: 3,
      correct,
      guesses: vec!["owl".into()],
      guess_attempts: 0,
      final_guess: Some("owl".into()),
      similarity_score: if correct { 1.0 } else { 0.2 },
      match_type,
      time_taken_secs: secs,
      round_score: 0,
      base_score: 0,
      score_multiplier: 1.0,
      gave_up: false,
      auto_revealed: !correct,
      game_mode: GameMode::Online,
    }
  }

  fn win(facts: u32) -> RoundRecord {
    record("animals", true, facts, 10.0, MatchType::Exact)
  }

  fn loss() -> RoundRecord {
    record("animals", false, 5, 60.0, MatchType::Different)
  }

  #[test]
  fn deterministic_fast_exact_first_fact() {
    let s = ScoringSystem::default();
    let input = ScoreInput { facts_shown: 1, wrong_guesses: 0, match_type: MatchType::Exact, elapsed: Duration::from_secs(10) };
    let score = s.score_round(&input, 1.2);
    assert_eq!(score.base, 1300);
    assert_eq!(score.total, 1560);
  }

  #[test]
  fn penalties_and_no_bonuses() {
    let s = ScoringSystem::default();
    let input = ScoreInput { facts_shown: 3, wrong_guesses: 2, match_type: MatchType::Similar, elapsed: Duration::from_secs(31) };
    // 1000 - 2*150 - 2*50
    assert_eq!(s.base_score(&input), 600);
    assert_eq!(s.score_round(&input, 1.5).total, 900);
  }

  #[test]
  fn floor_applies_before_multiplier() {
    let s = ScoringSystem::default();
    let input = ScoreInput { facts_shown: 5, wrong_guesses: 20, match_type: MatchType::Similar, elapsed: Duration::from_secs(300) };
    let score = s.score_round(&input, 0.8);
    assert_eq!(score.base, 50);
    assert_eq!(score.total, 40);
  }

  #[test]
  fn zero_facts_gets_no_extra_credit() {
    let s = ScoringSystem::default();
    let zero = ScoreInput { facts_shown: 0, wrong_guesses: 0, match_type: MatchType::Exact, elapsed: Duration::from_secs(5) };
    let one = ScoreInput { facts_shown: 1, ..zero };
    assert_eq!(s.base_score(&zero), s.base_score(&one));
  }

  #[test]
  fn time_bonus_boundary_is_inclusive() {
    let s = ScoringSystem::default();
    let input = ScoreInput { facts_shown: 1, wrong_guesses: 0, match_type: MatchType::Similar, elapsed: Duration::from_secs(30) };
    assert_eq!(s.base_score(&input), 1200);
  }

  #[test]
  fn grade_bounds() {
    let s = ScoringSystem::default();
    let perfect: Vec<_> = (0..4).map(|_| win(1)).collect();
    assert_eq!(s.grade_session(&perfect), Grade::APlus);

    let none: Vec<_> = (0..4).map(|_| loss()).collect();
    assert_eq!(s.grade_session(&none), Grade::F);
    assert_eq!(s.grade_session(&[]), Grade::F);

    // 2/3 wins, avg facts 7/3 => efficiency 2/3 => performance ~66.7
    let mixed = vec![win(1), win(1), loss()];
    assert_eq!(s.grade_session(&mixed), Grade::BMinus);
  }

  #[test]
  fn streak_and_flawless_badges() {
    let s = ScoringSystem::default();
    let rounds: Vec<_> = (0..5).map(|_| win(1)).collect();
    let badges = s.achievements(&rounds);
    assert!(badges.contains(&Achievement::OnFire));
    assert!(!badges.contains(&Achievement::HotStreak));
    assert!(badges.contains(&Achievement::LightningFast));
    assert!(badges.contains(&Achievement::MindReader));
    assert!(badges.contains(&Achievement::PerfectSpeller));
    assert!(badges.contains(&Achievement::CategoryExpert("animals".into())));
    assert!(badges.contains(&Achievement::FlawlessVictory));
  }

  #[test]
  fn mind_reader_needs_exactly_one_fact() {
    let s = ScoringSystem::default();
    let blind: Vec<_> = (0..3).map(|_| win(0)).collect();
    assert!(!s.achievements(&blind).contains(&Achievement::MindReader));
    let first_fact = vec![win(1), win(0), win(1), win(1)];
    assert!(s.achievements(&first_fact).contains(&Achievement::MindReader));
  }

  #[test]
  fn codes_survive_persistence() {
    for g in Grade::ALL {
      assert_eq!(Grade::parse(g.as_str()), Some(g));
    }
    assert_eq!(Grade::parse("Z"), None);
    let badges = [Achievement::OnFire, Achievement::CategoryExpert("famous people".into()), Achievement::MindReader];
    for b in badges {
      assert_eq!(Achievement::from_code(&b.code()), Some(b));
    }
    assert_eq!(Achievement::from_code("nope"), None);
  }

  #[test]
  fn broken_streak_counts_longest_run() {
    let rounds = vec![win(2), win(2), loss(), win(2), win(2), win(2)];
    assert_eq!(max_consecutive_wins(&rounds), 3);
    let badges = ScoringSystem::default().achievements(&rounds);
    assert!(badges.contains(&Achievement::HotStreak));
    assert!(!badges.contains(&Achievement::FlawlessVictory));
  }

  #[test]
  fn badge_labels() {
    assert_eq!(Achievement::CategoryExpert("animals".into()).to_string(), "Animals Expert (3+ wins)");
    assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
  }
}
