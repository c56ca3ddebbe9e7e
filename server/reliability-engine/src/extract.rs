//! Issue and positive extraction, one strategy per evidence source.
//!
//! Discussion evidence is free text and goes through signature scanning.
//! Recall and repair-database evidence already carries a structured judgment,
//! so each qualifying record maps directly to one item.

use std::collections::HashSet;

use crate::classify::{classify_frequency, classify_severity, estimate_affected};
use crate::config::{Config, Signature};
use crate::fingerprint;
use crate::types::*;

const POOR_REPAIR_DESCRIPTION: &str = "This device is difficult to repair, which may lead to \
                                       higher long-term costs and more e-waste.";

/// Common extraction contract shared by every evidence source.
pub trait SourceStrategy {
  fn source(&self) -> Source;

  /// `records` holds only this strategy's source, in pool order.
  fn extract_issues(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Issue>;

  fn extract_positives(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Positive>;
}

/// Free-text posts: scan for known signatures, one item per signature.
pub struct DiscussionStrategy;

/// Official recalls: one critical/high issue per distinct recall id.
pub struct RecallStrategy;

/// Repairability lookups: threshold rules on the best-matching record.
pub struct RepairStrategy;

/// All strategies, in the order their output is concatenated.
pub fn strategies() -> [&'static dyn SourceStrategy; 3] {
  [&DiscussionStrategy, &RecallStrategy, &RepairStrategy]
}

// ---------------------------------------------------------------------------
// Pool-level entry points
// ---------------------------------------------------------------------------

/// Run every strategy over its slice of the pool. Ordered by mention count
/// descending; ties keep strategy order, then signature-table order.
pub fn extract_issues(pool: &[EvidenceRecord], config: &Config) -> Vec<Issue> {
  let mut issues: Vec<Issue> = strategies()
    .iter()
    .flat_map(|s| s.extract_issues(&partition(pool, s.source()), config))
    .collect();
  issues.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
  issues
}

/// Positive counterpart of [`extract_issues`].
pub fn extract_positives(pool: &[EvidenceRecord], config: &Config) -> Vec<Positive> {
  let mut positives: Vec<Positive> = strategies()
    .iter()
    .flat_map(|s| s.extract_positives(&partition(pool, s.source()), config))
    .collect();
  positives.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
  positives
}

pub fn summarize_recalls(pool: &[EvidenceRecord], config: &Config) -> RecallSummary {
  let recalls = RecallStrategy.extract_issues(&partition(pool, Source::Recall), config);
  RecallSummary {
    has_recalls: !recalls.is_empty(),
    recall_count: count_u32(recalls.len()),
    recalls,
  }
}

pub fn summarize_repair(pool: &[EvidenceRecord]) -> RepairSummary {
  match best_repair_match(&partition(pool, Source::RepairDb)) {
    Some((record, score, guides)) => RepairSummary {
      found: true,
      repairability_score: score,
      guides_count: Some(guides),
      source_url: Some(record.url.clone()).filter(|u| !u.is_empty()),
    },
    None => RepairSummary::default(),
  }
}

fn partition(pool: &[EvidenceRecord], source: Source) -> Vec<&EvidenceRecord> {
  pool.iter().filter(|r| r.source == source).collect()
}

// ---------------------------------------------------------------------------
// Discussion
// ---------------------------------------------------------------------------

impl SourceStrategy for DiscussionStrategy {
  fn source(&self) -> Source {
    Source::Discussion
  }

  fn extract_issues(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Issue> {
    let total_posts = records.len();
    let negatives = lowered(records, Sentiment::Negative);
    if negatives.is_empty() {
      return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for sig in &config.issue_signatures {
      if seen.contains(sig.title.as_str()) {
        continue;
      }
      let matches = matching(&negatives, sig);
      let Some(first_reported) = matches.iter().map(|r| r.timestamp).min() else {
        continue;
      };
      seen.insert(sig.title.as_str());

      let mention_count = count_u32(matches.len());
      issues.push(Issue {
        id: fingerprint::issue_id(&sig.title),
        title: sig.title.clone(),
        description: format!("Multiple users reporting {} issues", sig.pattern),
        severity: classify_severity(&sig.title, mention_count, config),
        frequency: classify_frequency(mention_count, total_posts, config),
        affected_percentage: estimate_affected(mention_count, total_posts, config),
        mention_count,
        source_urls: matches
          .iter()
          .filter(|r| !r.url.is_empty())
          .take(config.max_source_urls)
          .map(|r| r.url.clone())
          .collect(),
        first_reported: first_reported.date_naive(),
        status: IssueStatus::Ongoing,
        workaround: None,
      });
    }

    issues.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
    issues
  }

  fn extract_positives(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Positive> {
    let total_posts = records.len();
    let positives_in = lowered(records, Sentiment::Positive);
    if positives_in.is_empty() {
      return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut positives = Vec::new();
    for sig in &config.positive_signatures {
      if seen.contains(sig.title.as_str()) {
        continue;
      }
      let count = count_u32(matching(&positives_in, sig).len());
      if count == 0 {
        continue;
      }
      seen.insert(sig.title.as_str());
      positives.push(Positive {
        id: fingerprint::positive_id(&sig.title),
        title: sig.title.clone(),
        frequency: classify_frequency(count, total_posts, config),
        mention_count: count,
      });
    }

    positives.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
    positives
  }
}

/// Records of one sentiment paired with their lower-cased text.
fn lowered<'a>(records: &[&'a EvidenceRecord], sentiment: Sentiment) -> Vec<(&'a EvidenceRecord, String)> {
  records
    .iter()
    .filter(|r| r.sentiment == sentiment)
    .map(|r| (*r, r.text.to_lowercase()))
    .collect()
}

fn matching<'a>(records: &[(&'a EvidenceRecord, String)], sig: &Signature) -> Vec<&'a EvidenceRecord> {
  let pattern = sig.pattern.to_lowercase();
  records
    .iter()
    .filter(|(_, text)| text.contains(pattern.as_str()))
    .map(|(r, _)| *r)
    .collect()
}

// ---------------------------------------------------------------------------
// Recall
// ---------------------------------------------------------------------------

impl SourceStrategy for RecallStrategy {
  fn source(&self) -> Source {
    Source::Recall
  }

  fn extract_issues(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Issue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();

    for record in records {
      // Recall-source records without a recall id are incident reports.
      let Some(RecordDetails::Recall {
        recall_id,
        hazard,
        remedy,
        injury,
      }) = &record.details
      else {
        continue;
      };
      if !seen.insert(recall_id.as_str()) {
        continue;
      }

      let hazard_lower = hazard.to_lowercase();
      let fire_like = config
        .structured
        .critical_hazards
        .iter()
        .any(|h| !h.is_empty() && hazard_lower.contains(h.to_lowercase().as_str()));
      let severity = if *injury || fire_like {
        Severity::Critical
      } else {
        Severity::High
      };

      let name = if record.title.is_empty() {
        "Unknown issue"
      } else {
        record.title.as_str()
      };
      let description = if hazard.is_empty() {
        record.text.clone()
      } else {
        hazard.clone()
      };

      issues.push(Issue {
        id: fingerprint::issue_id(&format!("recall {}", recall_id)),
        title: format!("RECALL: {}", name),
        description,
        severity,
        frequency: Frequency::Uncommon,
        affected_percentage: 0.0,
        mention_count: 1,
        source_urls: single_url(record),
        first_reported: record.timestamp.date_naive(),
        status: IssueStatus::Ongoing,
        workaround: remedy.clone(),
      });
    }

    issues
  }

  fn extract_positives(&self, _records: &[&EvidenceRecord], _config: &Config) -> Vec<Positive> {
    Vec::new()
  }
}

// ---------------------------------------------------------------------------
// Repair database
// ---------------------------------------------------------------------------

impl SourceStrategy for RepairStrategy {
  fn source(&self) -> Source {
    Source::RepairDb
  }

  fn extract_issues(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Issue> {
    let rules = &config.structured;
    let Some((record, Some(score), _)) = best_repair_match(records) else {
      return Vec::new();
    };
    if score > rules.poor_repair_max {
      return Vec::new();
    }

    let title = format!("Poor repairability score ({}/10)", score);
    let severity = if score > rules.severe_repair_max {
      Severity::Medium
    } else {
      Severity::High
    };
    vec![Issue {
      id: fingerprint::issue_id(&title),
      title,
      description: POOR_REPAIR_DESCRIPTION.to_string(),
      severity,
      frequency: Frequency::Uncommon,
      affected_percentage: 0.0,
      mention_count: 1,
      source_urls: single_url(record),
      first_reported: record.timestamp.date_naive(),
      status: IssueStatus::Ongoing,
      workaround: None,
    }]
  }

  fn extract_positives(&self, records: &[&EvidenceRecord], config: &Config) -> Vec<Positive> {
    let rules = &config.structured;
    let Some((_, score, guides)) = best_repair_match(records) else {
      return Vec::new();
    };

    let mut positives = Vec::new();
    if let Some(score) = score.filter(|s| *s >= rules.good_repair_min) {
      let title = format!("Excellent repairability ({}/10)", score);
      positives.push(Positive {
        id: fingerprint::positive_id(&title),
        title,
        frequency: Frequency::Uncommon,
        mention_count: 1,
      });
    }
    if guides >= rules.guides_min {
      let title = format!("Well-documented repairs ({} guides available)", guides);
      positives.push(Positive {
        id: fingerprint::positive_id(&title),
        title,
        frequency: Frequency::Uncommon,
        mention_count: guides,
      });
    }
    positives
  }
}

/// The first repair record carrying details is the best match.
fn best_repair_match<'a>(records: &[&'a EvidenceRecord]) -> Option<(&'a EvidenceRecord, Option<u8>, u32)> {
  records.iter().find_map(|r| match &r.details {
    Some(RecordDetails::Repair {
      repairability_score,
      guides_count,
    }) => Some((*r, *repairability_score, *guides_count)),
    _ => None,
  })
}

fn single_url(record: &EvidenceRecord) -> Vec<String> {
  if record.url.is_empty() {
    Vec::new()
  } else {
    vec![record.url.clone()]
  }
}

fn count_u32(n: usize) -> u32 {
  u32::try_from(n).unwrap_or(u32::MAX)
}
