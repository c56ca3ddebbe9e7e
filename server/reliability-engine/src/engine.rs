//! Per-product pipeline: normalize, extract, summarize, score, persist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::config::Config;
use crate::error::EngineError;
use crate::extract;
use crate::fetch::EvidenceFetcher;
use crate::normalize;
use crate::score;
use crate::store::ScoreStore;
use crate::types::*;

/// Window the reserved trend fields describe.
pub const TREND_PERIOD: &str = "90d";

/// The reliability engine. Stateless apart from the per-product lock table;
/// share it across threads behind an `Arc`.
pub struct Engine {
  config: Arc<Config>,
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self {
      config: Arc::new(config),
      locks: Mutex::new(HashMap::new()),
    }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Score one evidence bundle. Pure: nothing is persisted.
  ///
  /// Malformed records are dropped and counted. With no usable evidence at
  /// all, the report carries `score: None`.
  pub fn assess(&self, bundle: &EvidenceBundle) -> Result<ProductReport, EngineError> {
    let product_id = bundle.product_id.trim();
    if product_id.is_empty() {
      return Err(EngineError::validation("product_id", "missing"));
    }

    let (pool, dropped) = normalize::normalize_pool(&bundle.evidence);
    let config = self.config.as_ref();

    let issues = extract::extract_issues(&pool, config);
    let positives = extract::extract_positives(&pool, config);
    let recall_summary = extract::summarize_recalls(&pool, config);
    let repair_summary = extract::summarize_repair(&pool);

    let result = score::score(&issues, &positives, &recall_summary, &repair_summary, config)?;
    let snapshot = if result.data_points == 0 {
      tracing::info!(product = product_id, records = pool.len(), "insufficient data, no score");
      None
    } else {
      Some(ScoreSnapshot {
        product_id: product_id.to_string(),
        score: result,
        ruleset_version: config.version.clone(),
        calculated_at: bundle.as_of.unwrap_or_else(Utc::now),
        trend: None,
        trend_delta: None,
        trend_period: TREND_PERIOD.to_string(),
      })
    };

    tracing::debug!(
      product = product_id,
      accepted = pool.len(),
      dropped,
      issues = issues.len(),
      positives = positives.len(),
      recalls = recall_summary.recall_count,
      "assessed"
    );

    Ok(ProductReport {
      product_id: product_id.to_string(),
      issues,
      positives,
      recall_summary,
      repair_summary,
      score: snapshot,
      records_accepted: pool.len(),
      records_dropped: dropped,
    })
  }

  /// Fetch, assess and persist one product. At most one recompute per
  /// product runs at a time; different products never wait on each other.
  ///
  /// A fetcher that fails contributes no evidence.
  pub fn recompute(
    &self,
    product: &ProductRef,
    fetchers: &[&dyn EvidenceFetcher],
    store: &dyn ScoreStore,
  ) -> Result<ProductReport, EngineError> {
    let lock = self.product_lock(&product.id);
    let result = {
      let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      self.recompute_locked(product, fetchers, store)
    };
    self.release_lock(&product.id, lock);
    result
  }

  fn recompute_locked(
    &self,
    product: &ProductRef,
    fetchers: &[&dyn EvidenceFetcher],
    store: &dyn ScoreStore,
  ) -> Result<ProductReport, EngineError> {
    let mut evidence = Vec::new();
    for fetcher in fetchers {
      match fetcher.fetch(&product.name, product.brand.as_deref()) {
        Ok(records) => evidence.extend(records),
        Err(e) => {
          tracing::warn!(
            product = %product.id,
            source = fetcher.source().as_str(),
            error = %e,
            "evidence unavailable"
          );
        }
      }
    }

    let bundle = EvidenceBundle {
      product_id: product.id.clone(),
      product_name: Some(product.name.clone()),
      brand: product.brand.clone(),
      category: product.category.clone(),
      as_of: None,
      evidence,
    };
    let report = self.assess(&bundle)?;

    store.put_issues(&report.product_id, &report.issues)?;
    store.put_positives(&report.product_id, &report.positives)?;
    if let Some(snapshot) = &report.score {
      store.append_score(&report.product_id, snapshot)?;
      tracing::info!(
        product = %report.product_id,
        score = snapshot.score.score,
        grade = snapshot.score.grade.as_str(),
        "score recorded"
      );
    }
    Ok(report)
  }

  fn product_lock(&self, product_id: &str) -> Arc<Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locks
      .entry(product_id.to_string())
      .or_insert_with(|| Arc::new(Mutex::new(())))
      .clone()
  }

  /// Drop the table entry once nobody but the table and this caller holds it.
  fn release_lock(&self, product_id: &str, lock: Arc<Mutex<()>>) {
    let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let idle = locks
      .get(product_id)
      .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
    if idle {
      locks.remove(product_id);
    }
  }

  #[cfg(test)]
  fn tracked_locks(&self) -> usize {
    self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
  }
}
