//! Severity / frequency tiers and the affected-share heuristic. Pure functions.

use crate::config::Config;
use crate::types::{Frequency, Severity};

/// Keyword tiers first (critical -> high -> medium), mention count only as a
/// fallback for text no tier recognises.
pub fn classify_severity(text: &str, mention_count: u32, config: &Config) -> Severity {
  let rules = &config.severity;
  let text = text.to_lowercase();

  if contains_any(&text, &rules.critical_keywords) {
    return Severity::Critical;
  }
  if contains_any(&text, &rules.high_keywords) {
    return Severity::High;
  }
  if contains_any(&text, &rules.medium_keywords) {
    return Severity::Medium;
  }

  if mention_count > rules.high_mentions {
    Severity::High
  } else if mention_count > rules.medium_mentions {
    Severity::Medium
  } else {
    Severity::Low
  }
}

/// Bucket by share of all posts. No posts means `rare`.
pub fn classify_frequency(mention_count: u32, total_posts: usize, config: &Config) -> Frequency {
  let Some(pct) = percentage(mention_count, total_posts) else {
    return Frequency::Rare;
  };
  let rules = &config.frequency;
  if pct > rules.very_common_pct {
    Frequency::VeryCommon
  } else if pct > rules.common_pct {
    Frequency::Common
  } else if pct > rules.uncommon_pct {
    Frequency::Uncommon
  } else {
    Frequency::Rare
  }
}

/// Heuristic share of owners affected: raw share of posts, dampened, capped,
/// one decimal. A bias correction, not a statistical estimate.
pub fn estimate_affected(mention_count: u32, total_posts: usize, config: &Config) -> f64 {
  let Some(pct) = percentage(mention_count, total_posts) else {
    return 0.0;
  };
  let dampened = (pct * config.affected.dampening).clamp(0.0, config.affected.cap_pct);
  (dampened * 10.0).round() / 10.0
}

fn percentage(mention_count: u32, total_posts: usize) -> Option<f64> {
  if total_posts == 0 {
    return None;
  }
  Some(mention_count as f64 / total_posts as f64 * 100.0)
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
  keywords
    .iter()
    .any(|kw| !kw.is_empty() && text.contains(kw.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cfg() -> Config {
    Config::default()
  }

  #[test]
  fn critical_keyword_wins_regardless_of_count() {
    assert_eq!(classify_severity("Caught FIRE overnight", 0, &cfg()), Severity::Critical);
    assert_eq!(classify_severity("smoke from the vents", 500, &cfg()), Severity::Critical);
  }

  #[test]
  fn tier_precedence() {
    // "broken" (high) and "glitch" (medium) together -> high.
    assert_eq!(classify_severity("broken stand, glitch in OSD", 1, &cfg()), Severity::High);
    assert_eq!(classify_severity("annoying coil whine", 1, &cfg()), Severity::Medium);
  }

  #[test]
  fn uppercase_keywords_match() {
    assert_eq!(classify_severity("arrived DOA", 1, &cfg()), Severity::High);
  }

  #[test]
  fn count_fallback_for_unclassified_text() {
    assert_eq!(classify_severity("Visible scan lines", 101, &cfg()), Severity::High);
    assert_eq!(classify_severity("Visible scan lines", 100, &cfg()), Severity::Medium);
    assert_eq!(classify_severity("Visible scan lines", 31, &cfg()), Severity::Medium);
    assert_eq!(classify_severity("Visible scan lines", 30, &cfg()), Severity::Low);
  }

  #[test]
  fn severity_never_drops_as_mentions_grow() {
    let config = cfg();
    for text in ["Visible scan lines", "Flickering issues reported", "OLED burn-in concerns"] {
      let mut prev = Severity::Low;
      for n in 0..400 {
        let s = classify_severity(text, n, &config);
        assert!(s >= prev, "{text}: {s:?} < {prev:?} at {n}");
        prev = s;
      }
    }
  }

  #[test]
  fn frequency_buckets() {
    let config = cfg();
    assert_eq!(classify_frequency(26, 100, &config), Frequency::VeryCommon);
    assert_eq!(classify_frequency(25, 100, &config), Frequency::Common);
    assert_eq!(classify_frequency(11, 100, &config), Frequency::Common);
    assert_eq!(classify_frequency(10, 100, &config), Frequency::Uncommon);
    assert_eq!(classify_frequency(4, 100, &config), Frequency::Uncommon);
    assert_eq!(classify_frequency(3, 100, &config), Frequency::Rare);
  }

  #[test]
  fn zero_posts_is_rare_and_unaffected() {
    assert_eq!(classify_frequency(5, 0, &cfg()), Frequency::Rare);
    assert_eq!(estimate_affected(5, 0, &cfg()), 0.0);
  }

  #[test]
  fn affected_is_dampened_rounded_and_capped() {
    let config = cfg();
    // 10/40 = 25% * 0.6 = 15.0
    assert_eq!(estimate_affected(10, 40, &config), 15.0);
    // 1/3 = 33.33% * 0.6 = 19.999.. -> 20.0
    assert_eq!(estimate_affected(1, 3, &config), 20.0);
    // 100% * 0.6 = 60 -> capped at 50
    assert_eq!(estimate_affected(7, 7, &config), 50.0);
  }
}
