//! Product Reliability Feed
//!
//! HTTP service that scores evidence bundles with the reliability engine,
//! persists products, issues, positives and score history in PostgreSQL, and
//! serves product, category and trending views over them.
//! Bind to 127.0.0.1 by default (internal only).

mod error;
mod handlers;
mod state;
mod store;
mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use error::FeedError;
pub use handlers::{category_avoid, category_top, health, ingest, product, scores, search, trending};
pub use state::AppState;
pub use store::PgStore;

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/ingest", post(ingest))
    .route("/products/search", get(search))
    .route("/products/:id", get(product))
    .route("/products/:id/scores", get(scores))
    .route("/categories/:category/top", get(category_top))
    .route("/categories/:category/avoid", get(category_avoid))
    .route("/issues/trending", get(trending))
    .layer(CorsLayer::permissive())
    .with_state(state)
}
