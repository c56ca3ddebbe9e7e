//! Request/response types for the feed.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reliability_engine::types::{Confidence, Grade, Issue, Positive, ScoreSnapshot, Severity};
use reliability_engine::EngineError;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// Catalog entry, written on every ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
  pub product_id: String,
  pub name: String,
  pub brand: Option<String>,
  pub category: Option<String>,
}

/// Everything stored for one product.
#[derive(Debug, Serialize)]
pub struct ProductView {
  pub product_id: String,
  pub name: String,
  pub brand: Option<String>,
  pub category: Option<String>,
  pub score: Option<ScoreSnapshot>,
  pub critical_issue_count: usize,
  pub issues: Vec<Issue>,
  pub positives: Vec<Positive>,
  /// Present once the product has a category and a score.
  pub comparison: Option<Comparison>,
}

/// How a product sits within its category.
#[derive(Debug, Serialize)]
pub struct Comparison {
  pub category_average: Option<u8>,
  pub better_alternatives: Vec<ProductSummary>,
}

/// One product with its latest score, as listed by search and category views.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
  pub product_id: String,
  pub name: String,
  pub brand: Option<String>,
  pub category: Option<String>,
  pub score: Option<u8>,
  pub grade: Option<Grade>,
  pub confidence: Option<Confidence>,
}

#[derive(Debug, Serialize)]
pub struct RankedProduct {
  pub rank: usize,
  #[serde(flatten)]
  pub product: ProductSummary,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
  pub query: String,
  pub count: usize,
  pub results: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct CategoryTop {
  pub category: String,
  pub count: usize,
  pub top_products: Vec<RankedProduct>,
}

#[derive(Debug, Serialize)]
pub struct CategoryAvoid {
  pub category: String,
  pub count: usize,
  pub products_to_avoid: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct TrendingIssue {
  pub product_id: String,
  pub product_name: String,
  pub brand: Option<String>,
  pub issue: String,
  pub severity: Severity,
  pub mentions: u32,
  pub first_reported: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct TrendingIssues {
  pub period: &'static str,
  pub category: Option<String>,
  pub trending_issues: Vec<TrendingIssue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
  pub limit: Option<i64>,
}

impl HistoryQuery {
  pub fn limit(&self) -> i64 {
    self.limit.unwrap_or(50).clamp(1, 500)
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
  #[serde(default)]
  pub q: String,
  pub category: Option<String>,
  pub limit: Option<i64>,
}

impl SearchQuery {
  pub fn limit(&self) -> i64 {
    self.limit.unwrap_or(10).clamp(1, 50)
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
  pub limit: Option<i64>,
}

impl CategoryQuery {
  pub fn limit(&self) -> i64 {
    self.limit.unwrap_or(5).clamp(1, 20)
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingQuery {
  pub category: Option<String>,
  pub period: Option<String>,
}

/// Look-back window for trending issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
  Day,
  Week,
  Month,
}

impl Period {
  /// Absent means a week.
  pub fn parse(raw: Option<&str>) -> Result<Self, FeedError> {
    match raw.map(str::trim) {
      None | Some("7d") => Ok(Self::Week),
      Some("24h") => Ok(Self::Day),
      Some("30d") => Ok(Self::Month),
      Some(_) => Err(EngineError::validation("period", "expected 24h|7d|30d").into()),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Day => "24h",
      Self::Week => "7d",
      Self::Month => "30d",
    }
  }

  pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - match self {
      Self::Day => Duration::hours(24),
      Self::Week => Duration::days(7),
      Self::Month => Duration::days(30),
    }
  }
}

/// Rank is 1-based, in list order.
pub fn ranked(products: Vec<ProductSummary>) -> Vec<RankedProduct> {
  products
    .into_iter()
    .enumerate()
    .map(|(i, product)| RankedProduct { rank: i + 1, product })
    .collect()
}

/// Whole points; scores live in 0..=100 so the cast cannot truncate.
pub fn rounded_average(average: Option<f64>) -> Option<u8> {
  average.map(|a| a.round().clamp(0.0, 100.0) as u8)
}
