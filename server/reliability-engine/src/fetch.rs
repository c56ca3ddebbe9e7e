//! Evidence fetcher boundary.
//!
//! A fetcher turns a product name (and optional brand) into raw evidence from
//! one source. "Nothing known about this product" is `Ok(vec![])`; only a
//! transport failure is an error, and the engine downgrades that to zero
//! evidence.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::FetchError;
use crate::types::{InboundEvidence, Source};

pub trait EvidenceFetcher: Send + Sync {
  fn source(&self) -> Source;

  fn fetch(&self, product_name: &str, brand: Option<&str>) -> Result<Vec<InboundEvidence>, FetchError>;
}

/// Fixed in-memory records, returned for every product.
pub struct StaticFetcher {
  source: Source,
  records: Vec<InboundEvidence>,
}

impl StaticFetcher {
  pub fn new(source: Source, records: Vec<InboundEvidence>) -> Self {
    Self { source, records }
  }
}

impl EvidenceFetcher for StaticFetcher {
  fn source(&self) -> Source {
    self.source
  }

  fn fetch(&self, _product_name: &str, _brand: Option<&str>) -> Result<Vec<InboundEvidence>, FetchError> {
    Ok(stamp_source(self.records.clone(), self.source))
  }
}

/// Mock-data fetcher: `<root>/<source>/<product-slug>.json`, a JSON array of
/// records. A missing file means no data.
pub struct FixtureFetcher {
  source: Source,
  root: PathBuf,
}

impl FixtureFetcher {
  pub fn new(source: Source, root: impl Into<PathBuf>) -> Self {
    Self {
      source,
      root: root.into(),
    }
  }

  pub fn path_for(&self, product_name: &str, brand: Option<&str>) -> PathBuf {
    self
      .root
      .join(self.source.as_str())
      .join(format!("{}.json", slugify(product_name, brand)))
  }
}

impl EvidenceFetcher for FixtureFetcher {
  fn source(&self) -> Source {
    self.source
  }

  fn fetch(&self, product_name: &str, brand: Option<&str>) -> Result<Vec<InboundEvidence>, FetchError> {
    let path = self.path_for(product_name, brand);
    let body = match fs::read_to_string(&path) {
      Ok(b) => b,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        tracing::debug!(source = self.source.as_str(), path = %path.display(), "no fixture");
        return Ok(Vec::new());
      }
      Err(e) => {
        return Err(FetchError::Transport(format!("{}: {}", path.display(), e)));
      }
    };
    let values: Vec<serde_json::Value> = serde_json::from_str(&body)
      .map_err(|e| FetchError::Decode(format!("{}: {}", path.display(), e)))?;
    let records = values.into_iter().map(InboundEvidence::from_value).collect();
    Ok(stamp_source(records, self.source))
  }
}

/// Records that omit `source` inherit the fetcher's.
fn stamp_source(mut records: Vec<InboundEvidence>, source: Source) -> Vec<InboundEvidence> {
  for r in &mut records {
    if r.source.is_none() {
      r.source = Some(source.as_str().to_string());
    }
  }
  records
}

/// Product key used for fixture paths: lowercase ASCII alphanumerics joined by
/// single dashes, brand first unless the name already starts with it.
pub fn slugify(name: &str, brand: Option<&str>) -> String {
  let name = name.trim();
  let full = match brand.map(str::trim).filter(|b| !b.is_empty()) {
    Some(b) if !name.to_lowercase().starts_with(&b.to_lowercase()) => format!("{} {}", b, name),
    _ => name.to_string(),
  };

  let mut slug = String::with_capacity(full.len());
  for c in full.chars() {
    if c.is_ascii_alphanumeric() {
      slug.push(c.to_ascii_lowercase());
    } else if !slug.is_empty() && !slug.ends_with('-') {
      slug.push('-');
    }
  }
  while slug.ends_with('-') {
    slug.pop();
  }
  slug
}
