//! Persistence adapter boundary.
//!
//! Issues and positives are replaced wholesale per product; score snapshots
//! are append-only.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::types::{Issue, Positive, ScoreSnapshot};

pub trait ScoreStore: Send + Sync {
  fn put_issues(&self, product_id: &str, issues: &[Issue]) -> Result<(), StoreError>;

  fn put_positives(&self, product_id: &str, positives: &[Positive]) -> Result<(), StoreError>;

  fn append_score(&self, product_id: &str, snapshot: &ScoreSnapshot) -> Result<(), StoreError>;

  fn issues(&self, product_id: &str) -> Result<Vec<Issue>, StoreError>;

  fn positives(&self, product_id: &str) -> Result<Vec<Positive>, StoreError>;

  fn latest_score(&self, product_id: &str) -> Result<Option<ScoreSnapshot>, StoreError>;

  /// Newest first.
  fn score_history(&self, product_id: &str) -> Result<Vec<ScoreSnapshot>, StoreError>;
}

#[derive(Default)]
struct Tables {
  issues: HashMap<String, Vec<Issue>>,
  positives: HashMap<String, Vec<Positive>>,
  scores: HashMap<String, Vec<ScoreSnapshot>>,
}

/// In-process store for the CLI and tests.
#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
    self
      .tables
      .lock()
      .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
  }
}

impl ScoreStore for MemoryStore {
  fn put_issues(&self, product_id: &str, issues: &[Issue]) -> Result<(), StoreError> {
    self.lock()?.issues.insert(product_id.to_string(), issues.to_vec());
    Ok(())
  }

  fn put_positives(&self, product_id: &str, positives: &[Positive]) -> Result<(), StoreError> {
    self
      .lock()?
      .positives
      .insert(product_id.to_string(), positives.to_vec());
    Ok(())
  }

  fn append_score(&self, product_id: &str, snapshot: &ScoreSnapshot) -> Result<(), StoreError> {
    self
      .lock()?
      .scores
      .entry(product_id.to_string())
      .or_default()
      .push(snapshot.clone());
    Ok(())
  }

  fn issues(&self, product_id: &str) -> Result<Vec<Issue>, StoreError> {
    Ok(self.lock()?.issues.get(product_id).cloned().unwrap_or_default())
  }

  fn positives(&self, product_id: &str) -> Result<Vec<Positive>, StoreError> {
    Ok(self.lock()?.positives.get(product_id).cloned().unwrap_or_default())
  }

  fn latest_score(&self, product_id: &str) -> Result<Option<ScoreSnapshot>, StoreError> {
    Ok(self.lock()?.scores.get(product_id).and_then(|s| s.last().cloned()))
  }

  fn score_history(&self, product_id: &str) -> Result<Vec<ScoreSnapshot>, StoreError> {
    let tables = self.lock()?;
    let mut history = tables.scores.get(product_id).cloned().unwrap_or_default();
    history.reverse();
    Ok(history)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::*;
  use chrono::{TimeZone, Utc};

  fn snapshot(product: &str, score: u8, hour: u32) -> ScoreSnapshot {
    ScoreSnapshot {
      product_id: product.into(),
      score: ReliabilityScore {
        score,
        grade: Grade::B,
        confidence: Confidence::Low,
        data_points: 3,
        breakdown: ScoreBreakdown::default(),
      },
      ruleset_version: "test".into(),
      calculated_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
      trend: None,
      trend_delta: None,
      trend_period: "90d".into(),
    }
  }

  fn positive(title: &str) -> Positive {
    Positive {
      id: format!("pos-{title}"),
      title: title.into(),
      frequency: Frequency::Rare,
      mention_count: 1,
    }
  }

  #[test]
  fn put_replaces_previous_rows() {
    let store = MemoryStore::new();
    store.put_positives("p1", &[positive("a"), positive("b")]).unwrap();
    store.put_positives("p1", &[positive("c")]).unwrap();
    let rows = store.positives("p1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "c");
  }

  #[test]
  fn scores_are_appended_and_listed_newest_first() {
    let store = MemoryStore::new();
    store.append_score("p1", &snapshot("p1", 70, 1)).unwrap();
    store.append_score("p1", &snapshot("p1", 75, 2)).unwrap();
    store.append_score("p2", &snapshot("p2", 10, 3)).unwrap();

    assert_eq!(store.latest_score("p1").unwrap().unwrap().score.score, 75);
    let history = store.score_history("p1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].score.score, 75);
    assert_eq!(history[1].score.score, 70);
  }

  #[test]
  fn unknown_product_is_empty() {
    let store = MemoryStore::new();
    assert!(store.issues("nope").unwrap().is_empty());
    assert!(store.latest_score("nope").unwrap().is_none());
  }
}
