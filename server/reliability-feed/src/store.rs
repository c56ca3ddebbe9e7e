//! PostgreSQL persistence for products, issues, positives and score snapshots.
//!
//! Issues and positives are replaced per product; `reliability_scores` is
//! append-only. Category views rank products by their latest snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgPool, PgRow, Postgres};
use uuid::Uuid;

use reliability_engine::types::*;
use reliability_engine::EvidenceBundle;

use crate::error::FeedError;
use crate::types::{ProductInfo, ProductSummary, TrendingIssue};

const SCHEMA: [&str; 6] = [
  r#"
  CREATE TABLE IF NOT EXISTS products (
    product_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    brand TEXT,
    category TEXT,
    updated_at TIMESTAMPTZ NOT NULL
  )
  "#,
  "CREATE INDEX IF NOT EXISTS products_category_idx ON products (category)",
  r#"
  CREATE TABLE IF NOT EXISTS issues (
    product_id TEXT NOT NULL,
    issue_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    severity TEXT NOT NULL,
    frequency TEXT NOT NULL,
    affected_percentage DOUBLE PRECISION NOT NULL,
    mention_count BIGINT NOT NULL,
    source_urls TEXT[] NOT NULL,
    first_reported DATE NOT NULL,
    status TEXT NOT NULL,
    workaround TEXT,
    PRIMARY KEY (product_id, issue_id)
  )
  "#,
  r#"
  CREATE TABLE IF NOT EXISTS positives (
    product_id TEXT NOT NULL,
    positive_id TEXT NOT NULL,
    title TEXT NOT NULL,
    frequency TEXT NOT NULL,
    mention_count BIGINT NOT NULL,
    PRIMARY KEY (product_id, positive_id)
  )
  "#,
  r#"
  CREATE TABLE IF NOT EXISTS reliability_scores (
    id UUID PRIMARY KEY,
    seq BIGSERIAL,
    product_id TEXT NOT NULL,
    score SMALLINT NOT NULL,
    grade TEXT NOT NULL,
    confidence TEXT NOT NULL,
    data_points BIGINT NOT NULL,
    issue_penalty DOUBLE PRECISION NOT NULL,
    recall_penalty DOUBLE PRECISION NOT NULL,
    repairability_adjustment DOUBLE PRECISION NOT NULL,
    positive_bonus DOUBLE PRECISION NOT NULL,
    ruleset_version TEXT NOT NULL,
    calculated_at TIMESTAMPTZ NOT NULL,
    trend TEXT,
    trend_delta INTEGER,
    trend_period TEXT NOT NULL
  )
  "#,
  "CREATE INDEX IF NOT EXISTS reliability_scores_product_idx ON reliability_scores (product_id, seq DESC)",
];

const SCORE_COLUMNS: &str = "score, grade, confidence, data_points, issue_penalty, recall_penalty, \
                             repairability_adjustment, positive_bonus, ruleset_version, calculated_at, \
                             trend, trend_delta, trend_period";

/// Latest snapshot per product, as a CTE named `latest`.
const LATEST_SCORES: &str = "latest AS (SELECT DISTINCT ON (product_id) product_id, score, grade, confidence \
                             FROM reliability_scores ORDER BY product_id, seq DESC)";

const SUMMARY_COLUMNS: &str = "p.product_id, p.name, p.brand, p.category, l.score, l.grade, l.confidence";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Create tables on first start. Idempotent.
  pub async fn migrate(&self) -> Result<(), FeedError> {
    for statement in SCHEMA {
      query::<Postgres>(statement).execute(&self.pool).await?;
    }
    Ok(())
  }

  /// Product row, issues, positives and the score of one report, all or nothing.
  pub async fn save_report(&self, bundle: &EvidenceBundle, report: &ProductReport) -> Result<(), FeedError> {
    let mut tx = self.pool.begin().await?;
    put_product(&mut tx, &report.product_id, bundle).await?;
    put_issues(&mut tx, &report.product_id, &report.issues).await?;
    put_positives(&mut tx, &report.product_id, &report.positives).await?;
    if let Some(snapshot) = &report.score {
      append_score(&mut tx, snapshot).await?;
    }
    tx.commit().await?;
    Ok(())
  }

  pub async fn product_info(&self, product_id: &str) -> Result<Option<ProductInfo>, FeedError> {
    let row = query::<Postgres>("SELECT product_id, name, brand, category FROM products WHERE product_id = $1")
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    row
      .map(|r| {
        Ok(ProductInfo {
          product_id: r.try_get("product_id")?,
          name: r.try_get("name")?,
          brand: r.try_get("brand")?,
          category: r.try_get("category")?,
        })
      })
      .transpose()
  }

  /// Most severe first, then most mentioned.
  pub async fn issues(&self, product_id: &str) -> Result<Vec<Issue>, FeedError> {
    let rows = query::<Postgres>(
      r#"
      SELECT issue_id, title, description, severity, frequency, affected_percentage,
             mention_count, source_urls, first_reported, status, workaround
      FROM issues
      WHERE product_id = $1
      ORDER BY CASE severity
                 WHEN 'critical' THEN 0
                 WHEN 'high' THEN 1
                 WHEN 'medium' THEN 2
                 ELSE 3
               END,
               mention_count DESC,
               title
      "#,
    )
    .bind(product_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(issue_from_row).collect()
  }

  pub async fn positives(&self, product_id: &str) -> Result<Vec<Positive>, FeedError> {
    let rows = query::<Postgres>(
      "SELECT positive_id, title, frequency, mention_count FROM positives \
       WHERE product_id = $1 ORDER BY mention_count DESC, title",
    )
    .bind(product_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(positive_from_row).collect()
  }

  pub async fn latest_score(&self, product_id: &str) -> Result<Option<ScoreSnapshot>, FeedError> {
    let sql = format!(
      "SELECT {} FROM reliability_scores WHERE product_id = $1 ORDER BY seq DESC LIMIT 1",
      SCORE_COLUMNS
    );
    let row = query::<Postgres>(&sql)
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    row.map(|r| snapshot_from_row(product_id, &r)).transpose()
  }

  /// Newest first.
  pub async fn score_history(&self, product_id: &str, limit: i64) -> Result<Vec<ScoreSnapshot>, FeedError> {
    let sql = format!(
      "SELECT {} FROM reliability_scores WHERE product_id = $1 ORDER BY seq DESC LIMIT $2",
      SCORE_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(product_id)
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(|r| snapshot_from_row(product_id, r)).collect()
  }

  /// Name substring match, best scored first. Unscored products sort last.
  pub async fn search(
    &self,
    text: &str,
    category: Option<&str>,
    limit: i64,
  ) -> Result<Vec<ProductSummary>, FeedError> {
    let sql = format!(
      "WITH {} SELECT {} FROM products p LEFT JOIN latest l ON l.product_id = p.product_id \
       WHERE p.name ILIKE $1 AND ($2::TEXT IS NULL OR p.category = $2) \
       ORDER BY l.score DESC NULLS LAST, p.name LIMIT $3",
      LATEST_SCORES, SUMMARY_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(like_pattern(text))
      .bind(category)
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(summary_from_row).collect()
  }

  /// Scored products in a category, best first.
  pub async fn top_in_category(&self, category: &str, limit: i64) -> Result<Vec<ProductSummary>, FeedError> {
    let sql = format!(
      "WITH {} SELECT {} FROM products p JOIN latest l ON l.product_id = p.product_id \
       WHERE p.category = $1 ORDER BY l.score DESC, p.name LIMIT $2",
      LATEST_SCORES, SUMMARY_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(category)
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(summary_from_row).collect()
  }

  /// Products in a category scoring below `threshold`, worst first.
  pub async fn avoid_in_category(
    &self,
    category: &str,
    threshold: u8,
    limit: i64,
  ) -> Result<Vec<ProductSummary>, FeedError> {
    let sql = format!(
      "WITH {} SELECT {} FROM products p JOIN latest l ON l.product_id = p.product_id \
       WHERE p.category = $1 AND l.score < $2 ORDER BY l.score ASC, p.name LIMIT $3",
      LATEST_SCORES, SUMMARY_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(category)
      .bind(i16::from(threshold))
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(summary_from_row).collect()
  }

  /// Mean of the latest scores in a category; `None` when nothing is scored.
  pub async fn category_average(&self, category: &str) -> Result<Option<f64>, FeedError> {
    let sql = format!(
      "WITH {} SELECT AVG(l.score)::DOUBLE PRECISION AS average \
       FROM products p JOIN latest l ON l.product_id = p.product_id WHERE p.category = $1",
      LATEST_SCORES
    );
    let row = query::<Postgres>(&sql).bind(category).fetch_one(&self.pool).await?;
    Ok(row.try_get("average")?)
  }

  /// Same-category products scoring strictly higher than `score`.
  pub async fn better_alternatives(
    &self,
    category: &str,
    exclude: &str,
    score: u8,
    limit: i64,
  ) -> Result<Vec<ProductSummary>, FeedError> {
    let sql = format!(
      "WITH {} SELECT {} FROM products p JOIN latest l ON l.product_id = p.product_id \
       WHERE p.category = $1 AND p.product_id <> $2 AND l.score > $3 \
       ORDER BY l.score DESC, p.name LIMIT $4",
      LATEST_SCORES, SUMMARY_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(category)
      .bind(exclude)
      .bind(i16::from(score))
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(summary_from_row).collect()
  }

  /// Most mentioned issues of products refreshed since `since`.
  pub async fn trending_issues(
    &self,
    category: Option<&str>,
    since: DateTime<Utc>,
    limit: i64,
  ) -> Result<Vec<TrendingIssue>, FeedError> {
    let rows = query::<Postgres>(
      r#"
      SELECT i.product_id, p.name AS product_name, p.brand, i.title, i.severity,
             i.mention_count, i.first_reported
      FROM issues i
      JOIN products p ON p.product_id = i.product_id
      WHERE p.updated_at >= $1 AND ($2::TEXT IS NULL OR p.category = $2)
      ORDER BY i.mention_count DESC, i.title
      LIMIT $3
      "#,
    )
    .bind(since)
    .bind(category)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(trending_from_row).collect()
  }
}

async fn put_product(conn: &mut PgConnection, product_id: &str, bundle: &EvidenceBundle) -> Result<(), FeedError> {
  query::<Postgres>(
    r#"
    INSERT INTO products (product_id, name, brand, category, updated_at)
    VALUES ($1, COALESCE($2, $1), $3, $4, now())
    ON CONFLICT (product_id) DO UPDATE
    SET name = COALESCE($2, products.name),
        brand = COALESCE(EXCLUDED.brand, products.brand),
        category = COALESCE(EXCLUDED.category, products.category),
        updated_at = EXCLUDED.updated_at
    "#,
  )
  .bind(product_id)
  .bind(non_blank(bundle.product_name.as_deref()))
  .bind(non_blank(bundle.brand.as_deref()))
  .bind(non_blank(bundle.category.as_deref()))
  .execute(&mut *conn)
  .await?;
  Ok(())
}

async fn put_issues(conn: &mut PgConnection, product_id: &str, issues: &[Issue]) -> Result<(), FeedError> {
  query::<Postgres>("DELETE FROM issues WHERE product_id = $1")
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

  for issue in issues {
    query::<Postgres>(
      r#"
      INSERT INTO issues (product_id, issue_id, title, description, severity, frequency,
                          affected_percentage, mention_count, source_urls, first_reported,
                          status, workaround)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
      "#,
    )
    .bind(product_id)
    .bind(&issue.id)
    .bind(&issue.title)
    .bind(&issue.description)
    .bind(issue.severity.as_str())
    .bind(issue.frequency.as_str())
    .bind(issue.affected_percentage)
    .bind(i64::from(issue.mention_count))
    .bind(issue.source_urls.clone())
    .bind(issue.first_reported)
    .bind(issue.status.as_str())
    .bind(issue.workaround.clone())
    .execute(&mut *conn)
    .await?;
  }
  Ok(())
}

async fn put_positives(
  conn: &mut PgConnection,
  product_id: &str,
  positives: &[Positive],
) -> Result<(), FeedError> {
  query::<Postgres>("DELETE FROM positives WHERE product_id = $1")
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

  for positive in positives {
    query::<Postgres>(
      "INSERT INTO positives (product_id, positive_id, title, frequency, mention_count) \
       VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(product_id)
    .bind(&positive.id)
    .bind(&positive.title)
    .bind(positive.frequency.as_str())
    .bind(i64::from(positive.mention_count))
    .execute(&mut *conn)
    .await?;
  }
  Ok(())
}

async fn append_score(conn: &mut PgConnection, snapshot: &ScoreSnapshot) -> Result<(), FeedError> {
  let s = &snapshot.score;
  query::<Postgres>(
    r#"
    INSERT INTO reliability_scores (id, product_id, score, grade, confidence, data_points,
                                    issue_penalty, recall_penalty, repairability_adjustment,
                                    positive_bonus, ruleset_version, calculated_at, trend,
                                    trend_delta, trend_period)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
    "#,
  )
  .bind(Uuid::new_v4())
  .bind(&snapshot.product_id)
  .bind(i16::from(s.score))
  .bind(s.grade.as_str())
  .bind(s.confidence.as_str())
  .bind(i64::try_from(s.data_points).unwrap_or(i64::MAX))
  .bind(s.breakdown.issue_penalty)
  .bind(s.breakdown.recall_penalty)
  .bind(s.breakdown.repairability_adjustment)
  .bind(s.breakdown.positive_bonus)
  .bind(&snapshot.ruleset_version)
  .bind(snapshot.calculated_at)
  .bind(snapshot.trend.clone())
  .bind(snapshot.trend_delta)
  .bind(&snapshot.trend_period)
  .execute(&mut *conn)
  .await?;
  Ok(())
}

fn issue_from_row(row: &PgRow) -> Result<Issue, FeedError> {
  let severity: String = row.try_get("severity")?;
  let frequency: String = row.try_get("frequency")?;
  let status: String = row.try_get("status")?;
  let first_reported: NaiveDate = row.try_get("first_reported")?;
  Ok(Issue {
    id: row.try_get("issue_id")?,
    title: row.try_get("title")?,
    description: row.try_get("description")?,
    severity: parse_column("severity", &severity, Severity::from_str_loose)?,
    frequency: parse_column("frequency", &frequency, Frequency::from_str_loose)?,
    affected_percentage: row.try_get("affected_percentage")?,
    mention_count: count_from_db(row.try_get("mention_count")?)?,
    source_urls: row.try_get("source_urls")?,
    first_reported,
    status: parse_column("status", &status, IssueStatus::from_str_loose)?,
    workaround: row.try_get("workaround")?,
  })
}

fn positive_from_row(row: &PgRow) -> Result<Positive, FeedError> {
  let frequency: String = row.try_get("frequency")?;
  Ok(Positive {
    id: row.try_get("positive_id")?,
    title: row.try_get("title")?,
    frequency: parse_column("frequency", &frequency, Frequency::from_str_loose)?,
    mention_count: count_from_db(row.try_get("mention_count")?)?,
  })
}

fn snapshot_from_row(product_id: &str, row: &PgRow) -> Result<ScoreSnapshot, FeedError> {
  let score: i16 = row.try_get("score")?;
  let grade: String = row.try_get("grade")?;
  let confidence: String = row.try_get("confidence")?;
  let data_points: i64 = row.try_get("data_points")?;
  let calculated_at: DateTime<Utc> = row.try_get("calculated_at")?;
  Ok(ScoreSnapshot {
    product_id: product_id.to_string(),
    score: ReliabilityScore {
      score: u8::try_from(score).map_err(|_| FeedError::Corrupt(format!("score {}", score)))?,
      grade: parse_column("grade", &grade, Grade::from_str_loose)?,
      confidence: parse_column("confidence", &confidence, Confidence::from_str_loose)?,
      data_points: u64::try_from(data_points)
        .map_err(|_| FeedError::Corrupt(format!("data_points {}", data_points)))?,
      breakdown: ScoreBreakdown {
        issue_penalty: row.try_get("issue_penalty")?,
        recall_penalty: row.try_get("recall_penalty")?,
        repairability_adjustment: row.try_get("repairability_adjustment")?,
        positive_bonus: row.try_get("positive_bonus")?,
      },
    },
    ruleset_version: row.try_get("ruleset_version")?,
    calculated_at,
    trend: row.try_get("trend")?,
    trend_delta: row.try_get("trend_delta")?,
    trend_period: row.try_get("trend_period")?,
  })
}

fn summary_from_row(row: &PgRow) -> Result<ProductSummary, FeedError> {
  let score: Option<i16> = row.try_get("score")?;
  let grade: Option<String> = row.try_get("grade")?;
  let confidence: Option<String> = row.try_get("confidence")?;
  Ok(ProductSummary {
    product_id: row.try_get("product_id")?,
    name: row.try_get("name")?,
    brand: row.try_get("brand")?,
    category: row.try_get("category")?,
    score: score
      .map(|s| u8::try_from(s).map_err(|_| FeedError::Corrupt(format!("score {}", s))))
      .transpose()?,
    grade: grade
      .map(|g| parse_column("grade", &g, Grade::from_str_loose))
      .transpose()?,
    confidence: confidence
      .map(|c| parse_column("confidence", &c, Confidence::from_str_loose))
      .transpose()?,
  })
}

fn trending_from_row(row: &PgRow) -> Result<TrendingIssue, FeedError> {
  let severity: String = row.try_get("severity")?;
  Ok(TrendingIssue {
    product_id: row.try_get("product_id")?,
    product_name: row.try_get("product_name")?,
    brand: row.try_get("brand")?,
    issue: row.try_get("title")?,
    severity: parse_column("severity", &severity, Severity::from_str_loose)?,
    mentions: count_from_db(row.try_get("mention_count")?)?,
    first_reported: row.try_get("first_reported")?,
  })
}

/// ILIKE pattern matching `text` anywhere, with wildcards in `text` taken literally.
fn like_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for c in text.trim().chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

fn non_blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_column<T>(column: &str, raw: &str, parse: fn(&str) -> Option<T>) -> Result<T, FeedError> {
  parse(raw).ok_or_else(|| FeedError::Corrupt(format!("{} = {:?}", column, raw)))
}

fn count_from_db(n: i64) -> Result<u32, FeedError> {
  u32::try_from(n).map_err(|_| FeedError::Corrupt(format!("mention_count {}", n)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stored_labels_round_back() {
    assert_eq!(parse_column("grade", "B+", Grade::from_str_loose).unwrap(), Grade::BPlus);
    assert_eq!(
      parse_column("frequency", "very_common", Frequency::from_str_loose).unwrap(),
      Frequency::VeryCommon
    );
    assert_eq!(
      parse_column("status", "partially_resolved", IssueStatus::from_str_loose).unwrap(),
      IssueStatus::PartiallyResolved
    );
  }

  #[test]
  fn unknown_label_is_corrupt() {
    let err = parse_column("severity", "catastrophic", Severity::from_str_loose).unwrap_err();
    assert!(matches!(err, FeedError::Corrupt(_)));
  }

  #[test]
  fn negative_count_is_corrupt() {
    assert!(count_from_db(-1).is_err());
    assert_eq!(count_from_db(42).unwrap(), 42);
  }

  #[test]
  fn search_text_wildcards_are_literal() {
    assert_eq!(like_pattern("G9"), "%G9%");
    assert_eq!(like_pattern(" 100%_off "), "%100\\%\\_off%");
    assert_eq!(like_pattern(""), "%%");
  }

  #[test]
  fn blank_product_fields_are_absent() {
    assert_eq!(non_blank(Some("  ")), None);
    assert_eq!(non_blank(Some(" monitors ")), Some("monitors"));
    assert_eq!(non_blank(None), None);
  }

  #[test]
  fn category_queries_read_latest_snapshot() {
    assert!(LATEST_SCORES.contains("DISTINCT ON (product_id)"));
    assert!(LATEST_SCORES.contains("seq DESC"));
  }

  #[test]
  fn schema_statements_are_single() {
    for statement in SCHEMA {
      assert_eq!(statement.matches(';').count(), 0);
    }
  }
}
