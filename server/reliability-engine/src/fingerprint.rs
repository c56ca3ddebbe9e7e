//! Stable identifiers for extracted issues and positives.

/// Issue id derived from its canonical key: `iss-` + 16 hex chars.
///
/// The key is the signature title for discussion issues and the recall id for
/// recalls, so the same defect keeps the same id across runs.
pub fn issue_id(key: &str) -> String {
  format!("iss-{}", digest("issue", key))
}

/// Positive id derived from its canonical title: `pos-` + 16 hex chars.
pub fn positive_id(key: &str) -> String {
  format!("pos-{}", digest("positive", key))
}

fn digest(kind: &str, key: &str) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(kind.as_bytes());
  hasher.update(b"|");
  hasher.update(key.trim().to_lowercase().as_bytes());
  let hex = hasher.finalize().to_hex();
  hex[..16].to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_title_same_id() {
    assert_eq!(issue_id("Dead pixels on delivery"), issue_id("Dead pixels on delivery"));
  }

  #[test]
  fn case_and_padding_do_not_matter() {
    assert_eq!(issue_id("Dead pixels on delivery"), issue_id("  dead PIXELS on delivery "));
  }

  #[test]
  fn different_title_different_id() {
    assert_ne!(issue_id("Dead pixels on delivery"), issue_id("Visible scan lines"));
  }

  #[test]
  fn issue_and_positive_namespaces_differ() {
    let i = issue_id("Excellent repairability (8/10)");
    let p = positive_id("Excellent repairability (8/10)");
    assert_ne!(&i[4..], &p[4..]);
  }

  #[test]
  fn id_shape() {
    let id = positive_id("Stunning colors");
    assert!(id.starts_with("pos-"));
    assert_eq!(id.len(), 20);
    assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
  }
}
