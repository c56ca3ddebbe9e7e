//! Core types for the reliability engine (JSON contracts + internal models).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Enums (normalized)
// ---------------------------------------------------------------------------

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
  Discussion,
  Recall,
  RepairDb,
}

impl Source {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "discussion" | "reddit" | "reddit_mock" | "forum" => Some(Self::Discussion),
      "recall" | "cpsc" => Some(Self::Recall),
      "repair_db" | "repair" | "ifixit" => Some(Self::RepairDb),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Discussion => "discussion",
      Self::Recall => "recall",
      Self::RepairDb => "repair_db",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
  Positive,
  Negative,
  Neutral,
}

impl Sentiment {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "positive" | "pos" => Some(Self::Positive),
      "negative" | "neg" => Some(Self::Negative),
      "neutral" | "" => Some(Self::Neutral),
      _ => None,
    }
  }
}

/// Ordered low -> critical so tiers compare naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "low" => Some(Self::Low),
      "medium" => Some(Self::Medium),
      "high" => Some(Self::High),
      "critical" => Some(Self::Critical),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
  Rare,
  Uncommon,
  Common,
  VeryCommon,
}

impl Frequency {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Rare => "rare",
      Self::Uncommon => "uncommon",
      Self::Common => "common",
      Self::VeryCommon => "very_common",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "rare" => Some(Self::Rare),
      "uncommon" => Some(Self::Uncommon),
      "common" => Some(Self::Common),
      "very_common" => Some(Self::VeryCommon),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
  #[default]
  Ongoing,
  Unresolved,
  PartiallyResolved,
  Resolved,
}

impl IssueStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ongoing => "ongoing",
      Self::Unresolved => "unresolved",
      Self::PartiallyResolved => "partially_resolved",
      Self::Resolved => "resolved",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "ongoing" => Some(Self::Ongoing),
      "unresolved" => Some(Self::Unresolved),
      "partially_resolved" => Some(Self::PartiallyResolved),
      "resolved" => Some(Self::Resolved),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
  A,
  #[serde(rename = "B+")]
  BPlus,
  B,
  #[serde(rename = "C+")]
  CPlus,
  C,
  D,
  F,
}

impl Grade {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::A => "A",
      Self::BPlus => "B+",
      Self::B => "B",
      Self::CPlus => "C+",
      Self::C => "C",
      Self::D => "D",
      Self::F => "F",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "A" => Some(Self::A),
      "B+" => Some(Self::BPlus),
      "B" => Some(Self::B),
      "C+" => Some(Self::CPlus),
      "C" => Some(Self::C),
      "D" => Some(Self::D),
      "F" => Some(Self::F),
      _ => None,
    }
  }
}

/// How much evidence backs a score, independent of whether the score is good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
  Low,
  Medium,
  High,
}

impl Confidence {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "low" => Some(Self::Low),
      "medium" => Some(Self::Medium),
      "high" => Some(Self::High),
      _ => None,
    }
  }
}

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what fetchers and callers send)
// ---------------------------------------------------------------------------

/// One raw evidence record, before validation. Unknown fields are silently
/// ignored; every field is optional so a single bad record can be dropped
/// without failing the whole bundle. Numeric and flag fields stay as raw JSON
/// until normalization, since upstream feeds send `"12"` and `"Yes"` as often
/// as `12` and `true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEvidence {
  #[serde(default)]
  pub source: Option<String>,
  #[serde(default, alias = "source_url")]
  pub url: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default, alias = "content")]
  pub text: Option<String>,
  #[serde(default, alias = "date")]
  pub timestamp: Option<String>,
  #[serde(default)]
  pub sentiment: Option<String>,
  #[serde(default, alias = "upvotes")]
  pub engagement: Option<Value>,
  // Recall details.
  #[serde(default)]
  pub recall_id: Option<String>,
  #[serde(default)]
  pub hazard: Option<String>,
  #[serde(default)]
  pub remedy: Option<String>,
  #[serde(default)]
  pub injury: Option<Value>,
  // Repair database details.
  #[serde(default)]
  pub repairability_score: Option<Value>,
  #[serde(default)]
  pub guides_count: Option<Value>,
  /// Set when the record could not be decoded at all.
  #[serde(skip)]
  pub malformed: Option<String>,
}

impl InboundEvidence {
  /// Decode one record. A shape error becomes a record that normalization
  /// will drop, rather than an error for the whole batch.
  pub fn from_value(value: Value) -> Self {
    match serde_json::from_value(value) {
      Ok(record) => record,
      Err(e) => Self {
        malformed: Some(e.to_string()),
        ..Default::default()
      },
    }
  }
}

fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<InboundEvidence>, D::Error>
where
  D: Deserializer<'de>,
{
  let values = Vec::<Value>::deserialize(deserializer)?;
  Ok(values.into_iter().map(InboundEvidence::from_value).collect())
}

/// Everything known about one product for a single run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceBundle {
  pub product_id: String,
  #[serde(default)]
  pub product_name: Option<String>,
  #[serde(default)]
  pub brand: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  /// Snapshot time; defaults to now. Fixing it makes a run fully reproducible.
  #[serde(default)]
  pub as_of: Option<DateTime<Utc>>,
  #[serde(default, deserialize_with = "lenient_records")]
  pub evidence: Vec<InboundEvidence>,
}

/// External product identity. Not owned by the engine.
#[derive(Debug, Clone)]
pub struct ProductRef {
  pub id: String,
  pub name: String,
  pub brand: Option<String>,
  pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// Canonical evidence record after normalization + validation. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRecord {
  pub source: Source,
  pub url: String,
  pub title: String,
  pub text: String,
  pub timestamp: DateTime<Utc>,
  pub sentiment: Sentiment,
  pub engagement: u64,
  pub details: Option<RecordDetails>,
}

/// Structured judgment carried by recall and repair-database records.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDetails {
  Recall {
    recall_id: String,
    hazard: String,
    remedy: Option<String>,
    injury: bool,
  },
  Repair {
    repairability_score: Option<u8>,
    guides_count: u32,
  },
}

// ---------------------------------------------------------------------------
// Extracted items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub id: String,
  pub title: String,
  pub description: String,
  pub severity: Severity,
  pub frequency: Frequency,
  /// Heuristic share of owners affected, 0..=50. Not a probability.
  pub affected_percentage: f64,
  pub mention_count: u32,
  pub source_urls: Vec<String>,
  pub first_reported: NaiveDate,
  #[serde(default)]
  pub status: IssueStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workaround: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Positive {
  pub id: String,
  pub title: String,
  pub frequency: Frequency,
  pub mention_count: u32,
}

// ---------------------------------------------------------------------------
// Source summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallSummary {
  pub has_recalls: bool,
  pub recall_count: u32,
  #[serde(default)]
  pub recalls: Vec<Issue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairSummary {
  pub found: bool,
  #[serde(default)]
  pub repairability_score: Option<u8>,
  #[serde(default)]
  pub guides_count: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
  pub issue_penalty: f64,
  pub recall_penalty: f64,
  pub repairability_adjustment: f64,
  pub positive_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityScore {
  pub score: u8,
  pub grade: Grade,
  pub confidence: Confidence,
  pub data_points: u64,
  pub breakdown: ScoreBreakdown,
}

/// One append-only history row. `trend` / `trend_delta` are reserved and
/// never derived from history yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
  pub product_id: String,
  #[serde(flatten)]
  pub score: ReliabilityScore,
  pub ruleset_version: String,
  pub calculated_at: DateTime<Utc>,
  #[serde(default)]
  pub trend: Option<String>,
  #[serde(default)]
  pub trend_delta: Option<i32>,
  pub trend_period: String,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductReport {
  pub product_id: String,
  pub issues: Vec<Issue>,
  pub positives: Vec<Positive>,
  pub recall_summary: RecallSummary,
  pub repair_summary: RepairSummary,
  /// `None` means insufficient data: nothing to score.
  pub score: Option<ScoreSnapshot>,
  pub records_accepted: usize,
  pub records_dropped: usize,
}

impl ProductReport {
  pub fn critical_issue_count(&self) -> usize {
    self
      .issues
      .iter()
      .filter(|i| i.severity == Severity::Critical)
      .count()
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
