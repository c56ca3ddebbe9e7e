//! Structured error types for the reliability engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("parse: {0}")]
  Parse(String),

  #[error("config: {0}")]
  Config(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("store: {0}")]
  Store(#[from] StoreError),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn parse(msg: impl Into<String>) -> Self {
    Self::Parse(msg.into())
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }
}

/// Failure at the evidence-fetcher boundary. "Not found" is never an error;
/// only transport-level problems are.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("transport: {0}")]
  Transport(String),

  #[error("decode: {0}")]
  Decode(String),
}

/// Failure inside a persistence adapter.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store unavailable: {0}")]
  Unavailable(String),
}
