//! Normalize inbound evidence into canonical EvidenceRecord models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::EngineError;
use crate::types::*;

/// Parse and validate one raw record.
pub fn normalize_record(raw: &InboundEvidence) -> Result<EvidenceRecord, EngineError> {
  if let Some(reason) = &raw.malformed {
    return Err(EngineError::validation("record", reason));
  }

  let source_raw = raw
    .source
    .as_deref()
    .ok_or_else(|| EngineError::validation("source", "missing"))?;
  let source = Source::from_str_loose(source_raw)
    .ok_or_else(|| EngineError::validation("source", "expected discussion|recall|repair_db"))?;

  let timestamp_raw = raw
    .timestamp
    .as_deref()
    .ok_or_else(|| EngineError::validation("timestamp", "missing"))?;
  let timestamp = parse_timestamp(timestamp_raw)?;

  let title = raw.title.as_deref().unwrap_or_default().trim().to_string();
  let text = raw.text.as_deref().unwrap_or_default().trim().to_string();
  if title.is_empty() && text.is_empty() {
    return Err(EngineError::validation("text", "title and text are both empty"));
  }

  let engagement = match int_field("engagement", raw.engagement.as_ref())? {
    Some(n) if n < 0 => {
      return Err(EngineError::validation("engagement", "must not be negative"));
    }
    Some(n) => n as u64,
    None => 0,
  };

  // Recalls are official safety actions: always negative, whatever the caller said.
  let sentiment = if source == Source::Recall {
    Sentiment::Negative
  } else {
    match raw.sentiment.as_deref() {
      Some(s) => Sentiment::from_str_loose(s)
        .ok_or_else(|| EngineError::validation("sentiment", "expected positive|negative|neutral"))?,
      None => Sentiment::Neutral,
    }
  };

  let details = match source {
    Source::Recall => recall_details(raw)?,
    Source::RepairDb => Some(repair_details(raw)?),
    Source::Discussion => None,
  };

  Ok(EvidenceRecord {
    source,
    url: raw.url.as_deref().unwrap_or_default().trim().to_string(),
    title,
    text,
    timestamp,
    sentiment,
    engagement,
    details,
  })
}

/// Normalize a whole pool. Malformed records are logged and dropped; the
/// second value is how many were dropped.
pub fn normalize_pool(raw: &[InboundEvidence]) -> (Vec<EvidenceRecord>, usize) {
  let mut records = Vec::with_capacity(raw.len());
  let mut dropped = 0;
  for (index, item) in raw.iter().enumerate() {
    match normalize_record(item) {
      Ok(record) => records.push(record),
      Err(e) => {
        dropped += 1;
        tracing::warn!(
          index,
          source = item.source.as_deref().unwrap_or("?"),
          error = %e,
          "dropping malformed evidence record"
        );
      }
    }
  }
  (records, dropped)
}

fn recall_details(raw: &InboundEvidence) -> Result<Option<RecordDetails>, EngineError> {
  let Some(recall_id) = raw
    .recall_id
    .as_deref()
    .map(str::trim)
    .filter(|id| !id.is_empty())
  else {
    return Ok(None);
  };
  Ok(Some(RecordDetails::Recall {
    recall_id: recall_id.to_string(),
    hazard: raw.hazard.as_deref().unwrap_or_default().trim().to_string(),
    remedy: raw
      .remedy
      .as_deref()
      .map(str::trim)
      .filter(|r| !r.is_empty())
      .map(str::to_string),
    injury: bool_field("injury", raw.injury.as_ref())?.unwrap_or(false),
  }))
}

fn repair_details(raw: &InboundEvidence) -> Result<RecordDetails, EngineError> {
  let repairability_score = match int_field("repairability_score", raw.repairability_score.as_ref())? {
    Some(s) if !(0..=10).contains(&s) => {
      return Err(EngineError::validation(
        "repairability_score",
        "must be in 0..=10",
      ));
    }
    Some(s) => Some(s as u8),
    None => None,
  };
  let guides_count = match int_field("guides_count", raw.guides_count.as_ref())? {
    Some(g) if g < 0 => {
      return Err(EngineError::validation("guides_count", "must not be negative"));
    }
    Some(g) => u32::try_from(g).unwrap_or(u32::MAX),
    None => 0,
  };
  Ok(RecordDetails::Repair {
    repairability_score,
    guides_count,
  })
}

/// Integers may arrive as JSON numbers or numeric strings. Null means absent.
fn int_field(field: &str, value: Option<&Value>) -> Result<Option<i64>, EngineError> {
  match value {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => match n.as_i64() {
      Some(i) => Ok(Some(i)),
      None => Err(EngineError::validation(field, "expected an integer")),
    },
    Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
    Some(Value::String(s)) => s
      .trim()
      .parse::<i64>()
      .map(Some)
      .map_err(|_| EngineError::validation(field, "expected an integer")),
    Some(_) => Err(EngineError::validation(field, "expected an integer")),
  }
}

/// Flags may arrive as booleans, 0/1, or yes/no style strings.
fn bool_field(field: &str, value: Option<&Value>) -> Result<Option<bool>, EngineError> {
  match value {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Bool(b)) => Ok(Some(*b)),
    Some(Value::Number(n)) => match n.as_i64() {
      Some(0) => Ok(Some(false)),
      Some(1) => Ok(Some(true)),
      _ => Err(EngineError::validation(field, "expected a yes/no flag")),
    },
    Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
      "" => Ok(None),
      "yes" | "y" | "true" | "1" => Ok(Some(true)),
      "no" | "n" | "false" | "0" => Ok(Some(false)),
      _ => Err(EngineError::validation(field, "expected a yes/no flag")),
    },
    Some(_) => Err(EngineError::validation(field, "expected a yes/no flag")),
  }
}

/// Accept RFC3339, naive ISO datetimes (taken as UTC), or a bare date.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, EngineError> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
    return Ok(naive.and_utc());
  }
  if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
  {
    return Ok(naive.and_utc());
  }
  Err(EngineError::validation(
    "timestamp",
    &format!("unrecognised date/time: {}", s),
  ))
}
