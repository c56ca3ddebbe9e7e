//! Versioned scoring ruleset with sane defaults.
//!
//! Every threshold, keyword tier and signature table the engine consults lives
//! here. A `Config` is loaded once, shared behind an `Arc`, and its `version`
//! is stamped on every score snapshot so a result can be reproduced exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::Severity;

/// Canonical (pattern, title) pair used as the dedup key for a recurring theme.
///
/// `pattern` is matched as a case-insensitive substring of a record's text;
/// every matching record collapses into the single item named `title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
  pub pattern: String,
  pub title: String,
}

impl Signature {
  pub fn new(pattern: &str, title: &str) -> Self {
    Self {
      pattern: pattern.to_string(),
      title: title.to_string(),
    }
  }
}

/// Keyword tiers for severity, checked critical -> high -> medium, then the
/// mention-count fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityRules {
  pub critical_keywords: Vec<String>,
  pub high_keywords: Vec<String>,
  pub medium_keywords: Vec<String>,
  /// Unclassified text with more mentions than this is `high`.
  pub high_mentions: u32,
  /// Unclassified text with more mentions than this is `medium`.
  pub medium_mentions: u32,
}

impl Default for SeverityRules {
  fn default() -> Self {
    Self {
      critical_keywords: words(&[
        "fire", "burn", "shock", "injury", "dangerous", "recall", "safety", "explode", "smoke",
        "hazard",
      ]),
      high_keywords: words(&[
        "dead",
        "broken",
        "failed",
        "defect",
        "unusable",
        "refund",
        "warranty",
        "replacement",
        "doa",
        "return",
      ]),
      medium_keywords: words(&[
        "issue", "problem", "bug", "glitch", "annoying", "flicker", "noise", "loud", "slow",
      ]),
      high_mentions: 100,
      medium_mentions: 30,
    }
  }
}

/// Percentage-of-posts buckets (strictly greater than).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyRules {
  pub very_common_pct: f64,
  pub common_pct: f64,
  pub uncommon_pct: f64,
}

impl Default for FrequencyRules {
  fn default() -> Self {
    Self {
      very_common_pct: 25.0,
      common_pct: 10.0,
      uncommon_pct: 3.0,
    }
  }
}

/// Affected-percentage heuristic. Complaints are over-represented relative to
/// silent satisfied owners, so the raw share is dampened and capped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffectedRules {
  pub dampening: f64,
  pub cap_pct: f64,
}

impl Default for AffectedRules {
  fn default() -> Self {
    Self {
      dampening: 0.6,
      cap_pct: 50.0,
    }
  }
}

/// Rules for sources that already carry a structured judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredRules {
  /// Repairability at or below this is an issue.
  pub poor_repair_max: u8,
  /// Repairability at or below this makes that issue `high` instead of `medium`.
  pub severe_repair_max: u8,
  /// Repairability at or above this is a positive.
  pub good_repair_min: u8,
  /// Guide count at or above this is a positive.
  pub guides_min: u32,
  /// Hazard terms that make a recall `critical` rather than `high`.
  pub critical_hazards: Vec<String>,
}

impl Default for StructuredRules {
  fn default() -> Self {
    Self {
      poor_repair_max: 4,
      severe_repair_max: 2,
      good_repair_min: 7,
      guides_min: 10,
      critical_hazards: words(&["fire"]),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
  pub critical: f64,
  pub high: f64,
  pub medium: f64,
  pub low: f64,
}

impl SeverityWeights {
  pub fn weight(&self, severity: Severity) -> f64 {
    match severity {
      Severity::Critical => self.critical,
      Severity::High => self.high,
      Severity::Medium => self.medium,
      Severity::Low => self.low,
    }
  }
}

impl Default for SeverityWeights {
  fn default() -> Self {
    Self {
      critical: 25.0,
      high: 15.0,
      medium: 8.0,
      low: 3.0,
    }
  }
}

/// Weights and caps for the score pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
  pub base: f64,
  pub severity_weights: SeverityWeights,
  /// Multiplier on log10(mentions); diminishing penalty for very high counts.
  pub mention_log_factor: f64,
  pub issue_penalty_cap: f64,
  pub recall_penalty_each: f64,
  pub recall_penalty_cap: f64,
  /// Repairability that contributes nothing.
  pub repair_neutral: f64,
  pub repair_factor: f64,
  pub positive_mention_weight: f64,
  pub positive_each_cap: f64,
  pub positive_total_cap: f64,
}

impl Default for ScoringRules {
  fn default() -> Self {
    Self {
      base: 100.0,
      severity_weights: SeverityWeights::default(),
      mention_log_factor: 0.3,
      issue_penalty_cap: 60.0,
      recall_penalty_each: 20.0,
      recall_penalty_cap: 40.0,
      repair_neutral: 5.0,
      repair_factor: 1.5,
      positive_mention_weight: 0.02,
      positive_each_cap: 3.0,
      positive_total_cap: 10.0,
    }
  }
}

/// Minimum score for each grade; anything below `d` is an F.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeBreakpoints {
  pub a: u8,
  pub b_plus: u8,
  pub b: u8,
  pub c_plus: u8,
  pub c: u8,
  pub d: u8,
}

impl GradeBreakpoints {
  fn descending(&self) -> bool {
    let steps = [self.a, self.b_plus, self.b, self.c_plus, self.c, self.d];
    steps.windows(2).all(|w| w[0] > w[1])
  }
}

impl Default for GradeBreakpoints {
  fn default() -> Self {
    Self {
      a: 90,
      b_plus: 80,
      b: 70,
      c_plus: 60,
      c: 50,
      d: 40,
    }
  }
}

/// Data-point volume needed for each confidence level (strictly greater than).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceRules {
  pub high_above: u64,
  pub medium_above: u64,
}

impl Default for ConfidenceRules {
  fn default() -> Self {
    Self {
      high_above: 500,
      medium_above: 100,
    }
  }
}

/// The complete ruleset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Ruleset version stamped on every score snapshot.
  pub version: String,
  pub severity: SeverityRules,
  pub frequency: FrequencyRules,
  pub affected: AffectedRules,
  /// Max source URLs kept per issue.
  pub max_source_urls: usize,
  pub issue_signatures: Vec<Signature>,
  pub positive_signatures: Vec<Signature>,
  pub structured: StructuredRules,
  pub scoring: ScoringRules,
  pub grades: GradeBreakpoints,
  pub confidence: ConfidenceRules,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      version: "2024.1".to_string(),
      severity: SeverityRules::default(),
      frequency: FrequencyRules::default(),
      affected: AffectedRules::default(),
      max_source_urls: 5,
      issue_signatures: vec![
        Signature::new("flicker", "Flickering issues reported"),
        Signature::new("dead pixel", "Dead pixels on delivery"),
        Signature::new("backlight bleed", "Backlight bleed issues"),
        Signature::new("burn-in", "OLED burn-in concerns"),
        Signature::new("scan line", "Visible scan lines"),
        Signature::new("quality control", "Quality control problems"),
        Signature::new("defect", "Manufacturing defects reported"),
      ],
      positive_signatures: vec![
        Signature::new("amazing", "Highly praised by users"),
        Signature::new("love it", "Users love this product"),
        Signature::new("worth", "Considered worth the price"),
        Signature::new("best", "Rated as best in class"),
        Signature::new("color", "Excellent color quality"),
        Signature::new("immersive", "Immersive experience"),
      ],
      structured: StructuredRules::default(),
      scoring: ScoringRules::default(),
      grades: GradeBreakpoints::default(),
      confidence: ConfidenceRules::default(),
    }
  }
}

impl Config {
  /// Parse a ruleset override. Missing fields fall back to the defaults.
  pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
    let config: Config = serde_json::from_str(s)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    Self::from_json_str(&raw)
  }

  /// Reject rulesets that would make scoring incoherent.
  pub fn validate(&self) -> Result<(), EngineError> {
    if self.version.trim().is_empty() {
      return Err(EngineError::config("version must not be empty"));
    }
    if !(self.affected.dampening > 0.0 && self.affected.dampening <= 1.0) {
      return Err(EngineError::config("affected.dampening must be in (0, 1]"));
    }
    if !(0.0..=10.0).contains(&self.scoring.repair_neutral) {
      return Err(EngineError::config("scoring.repair_neutral must be in 0..=10"));
    }
    if !self.grades.descending() {
      return Err(EngineError::config("grade breakpoints must be strictly descending"));
    }
    if self.confidence.high_above <= self.confidence.medium_above {
      return Err(EngineError::config(
        "confidence.high_above must exceed confidence.medium_above",
      ));
    }
    if self.max_source_urls == 0 {
      return Err(EngineError::config("max_source_urls must be at least 1"));
    }
    let blank = self
      .issue_signatures
      .iter()
      .chain(&self.positive_signatures)
      .any(|s| s.pattern.trim().is_empty() || s.title.trim().is_empty());
    if blank {
      return Err(EngineError::config("signatures need a pattern and a title"));
    }
    Ok(())
  }
}

fn words(list: &[&str]) -> Vec<String> {
  list.iter().map(|w| w.to_string()).collect()
}
