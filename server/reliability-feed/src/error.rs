//! Request-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reliability_engine::types::ErrorOutput;
use reliability_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error("db: {0}")]
  Db(#[from] sqlx_core::Error),

  /// A stored row no longer parses into a domain value.
  #[error("corrupt row: {0}")]
  Corrupt(String),

  #[error("not found: {0}")]
  NotFound(String),
}

impl FeedError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::Engine(EngineError::Validation { .. }) | Self::Engine(EngineError::Parse(_)) => {
        StatusCode::BAD_REQUEST
      }
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for FeedError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      Self::Engine(EngineError::Validation { field, reason }) => {
        ErrorOutput::new(reason.clone()).with_field(field.clone())
      }
      Self::Db(_) | Self::Corrupt(_) => {
        tracing::error!(error = %self, "database operation failed");
        ErrorOutput::new("database operation failed")
      }
      _ => ErrorOutput::new(self.to_string()),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_is_bad_request() {
    let err = FeedError::from(EngineError::validation("product_id", "missing"));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn missing_product_is_not_found() {
    assert_eq!(FeedError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn storage_failures_are_internal() {
    assert_eq!(FeedError::Corrupt("bad grade".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      FeedError::from(sqlx_core::Error::PoolTimedOut).status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
