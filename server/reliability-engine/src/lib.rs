//! Product Reliability Engine: deterministic, rule-based scoring.
//!
//! Takes pooled evidence about one product (discussion posts, safety recalls,
//! repairability lookups), drops malformed records, extracts deduplicated
//! issues and positives, and folds them into a bounded 0..=100 score with a
//! letter grade and a confidence level.
//!
//! No AI, no network; pure computation over a versioned ruleset. Fetching and
//! persistence sit behind the `EvidenceFetcher` and `ScoreStore` traits.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod normalize;
pub mod score;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, FetchError, StoreError};
pub use fetch::{EvidenceFetcher, FixtureFetcher, StaticFetcher};
pub use store::{MemoryStore, ScoreStore};
pub use types::{EvidenceBundle, InboundEvidence, ProductReport, ProductRef};
