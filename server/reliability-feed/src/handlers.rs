//! HTTP handlers for the reliability feed.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use reliability_engine::types::{Issue, Positive, ProductReport, ScoreSnapshot, Severity};
use reliability_engine::EvidenceBundle;

use crate::error::FeedError;
use crate::state::AppState;
use crate::types::*;

const ALTERNATIVES: i64 = 3;
const TRENDING: i64 = 10;

pub async fn health() -> &'static str {
  "ok"
}

/// Score a bundle and persist the result. Ingests for the same product are
/// serialized so a stored score always matches the stored issues.
pub async fn ingest(
  State(state): State<Arc<AppState>>,
  Json(bundle): Json<EvidenceBundle>,
) -> Result<Json<ProductReport>, FeedError> {
  let product_id = bundle.product_id.trim().to_string();
  let lock = state.product_lock(&product_id);
  let result = {
    let _guard = lock.lock().await;
    ingest_locked(&state, &bundle).await
  };
  state.release_lock(&product_id, lock);
  result.map(Json)
}

async fn ingest_locked(state: &AppState, bundle: &EvidenceBundle) -> Result<ProductReport, FeedError> {
  let report = state.engine.assess(bundle).map_err(|e| {
    tracing::warn!(product = %bundle.product_id, error = %e, "rejected bundle");
    e
  })?;
  state.store.save_report(bundle, &report).await?;

  match &report.score {
    Some(s) => tracing::info!(
      product = %report.product_id,
      score = s.score.score,
      grade = s.score.grade.as_str(),
      dropped = report.records_dropped,
      "ingested"
    ),
    None => tracing::info!(product = %report.product_id, "ingested, insufficient data"),
  }
  Ok(report)
}

pub async fn product(
  State(state): State<Arc<AppState>>,
  Path(product_id): Path<String>,
) -> Result<Json<ProductView>, FeedError> {
  let info = state.store.product_info(&product_id).await?;
  let score = state.store.latest_score(&product_id).await?;
  let issues = state.store.issues(&product_id).await?;
  let positives = state.store.positives(&product_id).await?;
  let mut view = product_view(product_id, info, score, issues, positives)?;

  if let (Some(category), Some(snapshot)) = (&view.category, &view.score) {
    let average = state.store.category_average(category).await?;
    let better_alternatives = state
      .store
      .better_alternatives(category, &view.product_id, snapshot.score.score, ALTERNATIVES)
      .await?;
    view.comparison = Some(Comparison {
      category_average: rounded_average(average),
      better_alternatives,
    });
  }
  Ok(Json(view))
}

pub async fn scores(
  State(state): State<Arc<AppState>>,
  Path(product_id): Path<String>,
  Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<ScoreSnapshot>>, FeedError> {
  let history = state.store.score_history(&product_id, q.limit()).await?;
  non_empty(format!("product {}", product_id), history).map(Json)
}

pub async fn search(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResults>, FeedError> {
  let results = state
    .store
    .search(&q.q, q.category.as_deref(), q.limit())
    .await?;
  Ok(Json(SearchResults {
    count: results.len(),
    query: q.q,
    results,
  }))
}

pub async fn category_top(
  State(state): State<Arc<AppState>>,
  Path(category): Path<String>,
  Query(q): Query<CategoryQuery>,
) -> Result<Json<CategoryTop>, FeedError> {
  let products = state.store.top_in_category(&category, q.limit()).await?;
  let top_products = ranked(non_empty(format!("category {}", category), products)?);
  Ok(Json(CategoryTop {
    category,
    count: top_products.len(),
    top_products,
  }))
}

/// Products graded below C+ under the active ruleset, worst first.
pub async fn category_avoid(
  State(state): State<Arc<AppState>>,
  Path(category): Path<String>,
  Query(q): Query<CategoryQuery>,
) -> Result<Json<CategoryAvoid>, FeedError> {
  let threshold = state.engine.config().grades.c_plus;
  let products_to_avoid = state
    .store
    .avoid_in_category(&category, threshold, q.limit())
    .await?;
  Ok(Json(CategoryAvoid {
    category,
    count: products_to_avoid.len(),
    products_to_avoid,
  }))
}

pub async fn trending(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TrendingQuery>,
) -> Result<Json<TrendingIssues>, FeedError> {
  let period = Period::parse(q.period.as_deref())?;
  let trending_issues = state
    .store
    .trending_issues(q.category.as_deref(), period.since(Utc::now()), TRENDING)
    .await?;
  Ok(Json(TrendingIssues {
    period: period.as_str(),
    category: q.category,
    trending_issues,
  }))
}

/// A product with no catalog row and nothing stored is unknown.
fn product_view(
  product_id: String,
  info: Option<ProductInfo>,
  score: Option<ScoreSnapshot>,
  issues: Vec<Issue>,
  positives: Vec<Positive>,
) -> Result<ProductView, FeedError> {
  if info.is_none() && score.is_none() && issues.is_empty() && positives.is_empty() {
    return Err(FeedError::NotFound(format!("product {}", product_id)));
  }

  let (name, brand, category) = match info {
    Some(i) => (i.name, i.brand, i.category),
    None => (product_id.clone(), None, None),
  };
  let critical_issue_count = issues.iter().filter(|i| i.severity == Severity::Critical).count();
  Ok(ProductView {
    product_id,
    name,
    brand,
    category,
    score,
    critical_issue_count,
    issues,
    positives,
    comparison: None,
  })
}

fn non_empty<T>(what: String, items: Vec<T>) -> Result<Vec<T>, FeedError> {
  if items.is_empty() {
    return Err(FeedError::NotFound(what));
  }
  Ok(items)
}
