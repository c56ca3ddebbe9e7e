//! Binary entrypoint: read JSON lines from stdin, write JSON lines to stdout.
//!
//! Each input line is an EvidenceBundle. Each output line is either a
//! ProductReport or an ErrorOutput. Logs go to stderr.
//!
//! Environment:
//! - `RULESET_PATH`: JSON ruleset overriding the built-in defaults.
//! - `FIXTURES_DIR`: also pull evidence from `<dir>/<source>/<slug>.json`
//!   and keep score history in memory for the life of the process.
//! - `RUST_LOG`: log filter (default `info`).

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use reliability_engine::types::{ErrorOutput, ProductRef, Source};
use reliability_engine::{
  Config, Engine, EngineError, EvidenceBundle, EvidenceFetcher, FixtureFetcher, MemoryStore, ProductReport,
  StaticFetcher,
};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let config = match std::env::var("RULESET_PATH") {
    Ok(path) => match Config::from_file(&path) {
      Ok(c) => c,
      Err(e) => {
        tracing::error!(path = %path, error = %e, "cannot load ruleset");
        std::process::exit(1);
      }
    },
    Err(_) => Config::default(),
  };
  tracing::info!(version = %config.version, "ruleset loaded");

  let fixtures = std::env::var("FIXTURES_DIR").ok().map(PathBuf::from);
  let engine = Engine::new(config);
  let store = MemoryStore::new();

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        tracing::error!(error = %e, "stdin read error");
        std::process::exit(1);
      }
    };

    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let bundle: EvidenceBundle = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        emit(&mut out, &ErrorOutput::new(format!("json parse: {}", e)));
        continue;
      }
    };

    let result = match fixtures.as_deref() {
      Some(dir) => recompute_with_fixtures(&engine, &store, dir, bundle),
      None => engine.assess(&bundle),
    };

    match result {
      Ok(report) => emit(&mut out, &report),
      Err(e) => {
        let err = match &e {
          EngineError::Validation { field, reason } => ErrorOutput::new(reason.clone()).with_field(field.clone()),
          _ => ErrorOutput::new(e.to_string()),
        };
        emit(&mut out, &err);
      }
    }
  }

  let _ = out.flush();
}

fn recompute_with_fixtures(
  engine: &Engine,
  store: &MemoryStore,
  dir: &Path,
  bundle: EvidenceBundle,
) -> Result<ProductReport, EngineError> {
  let product = ProductRef {
    name: bundle.product_name.clone().unwrap_or_else(|| bundle.product_id.clone()),
    id: bundle.product_id,
    brand: bundle.brand,
    category: bundle.category,
  };
  let inline = StaticFetcher::new(Source::Discussion, bundle.evidence);
  let discussion = FixtureFetcher::new(Source::Discussion, dir);
  let recall = FixtureFetcher::new(Source::Recall, dir);
  let repair = FixtureFetcher::new(Source::RepairDb, dir);
  let fetchers: [&dyn EvidenceFetcher; 4] = [&inline, &discussion, &recall, &repair];
  engine.recompute(&product, &fetchers, store)
}

fn emit<W: Write, T: serde::Serialize>(out: &mut W, value: &T) {
  let _ = serde_json::to_writer(&mut *out, value);
  let _ = writeln!(out);
}
