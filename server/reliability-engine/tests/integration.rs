//! Integration tests for the reliability engine.

use std::fs;

use reliability_engine::types::{Confidence, Grade, ProductRef, Severity, Source};
use reliability_engine::{
  Config, Engine, EvidenceBundle, EvidenceFetcher, FixtureFetcher, MemoryStore, ScoreStore,
};

fn fixture_bundle() -> EvidenceBundle {
  let json = r#"{
    "product_id": "mon-odyssey-g9",
    "product_name": "Odyssey G9",
    "brand": "Samsung",
    "as_of": "2024-05-01T00:00:00Z",
    "evidence": [
      {"source": "reddit", "source_url": "https://reddit.com/r/monitors/comments/a1", "title": "G9 flicker",
       "content": "Flicker at 240Hz with HDR on", "date": "2024-03-02T10:00:00Z", "sentiment": "negative", "upvotes": 41},
      {"source": "reddit", "source_url": "https://reddit.com/r/monitors/comments/a2", "title": "Second unit",
       "content": "Mine has flicker too and a dead pixel", "date": "2024-02-20T08:30:00Z", "sentiment": "negative", "upvotes": 12},
      {"source": "reddit", "source_url": "https://reddit.com/r/monitors/comments/a3", "title": "Six months in",
       "content": "Colors are amazing, love it", "date": "2024-03-10T18:00:00Z", "sentiment": "positive", "upvotes": 88},
      {"source": "reddit", "source_url": "https://reddit.com/r/monitors/comments/a4", "title": "Stand?",
       "content": "What stand do you use?", "date": "2024-03-11T18:00:00Z", "sentiment": "neutral"},
      {"source": "cpsc", "url": "https://cpsc.gov/Recalls/2024/24-117", "title": "Power supply overheating",
       "text": "External power supply can overheat", "timestamp": "2024-01-15", "recall_id": "24-117",
       "hazard": "Fire hazard", "remedy": "Free replacement power supply"},
      {"source": "ifixit", "url": "https://ifixit.com/Device/Samsung_Odyssey_G9", "title": "Samsung Odyssey G9",
       "timestamp": "2024-01-01", "repairability_score": 4, "guides_count": 12},
      {"source": "myspace", "title": "??", "timestamp": "2024-01-01", "text": "unknown source"}
    ]
  }"#;
  serde_json::from_str(json).unwrap()
}

#[test]
fn mixed_evidence_produces_full_report() {
  let engine = Engine::with_defaults();
  let report = engine.assess(&fixture_bundle()).unwrap();

  assert_eq!(report.product_id, "mon-odyssey-g9");
  assert_eq!(report.records_accepted, 6);
  assert_eq!(report.records_dropped, 1);

  // Issues, by mentions descending.
  let titles: Vec<_> = report.issues.iter().map(|i| i.title.as_str()).collect();
  assert_eq!(
    titles,
    [
      "Flickering issues reported",
      "Dead pixels on delivery",
      "RECALL: Power supply overheating",
      "Poor repairability score (4/10)",
    ]
  );
  let flicker = &report.issues[0];
  assert_eq!(flicker.mention_count, 2);
  assert_eq!(flicker.first_reported.to_string(), "2024-02-20");
  assert_eq!(flicker.source_urls.len(), 2);
  assert!(flicker.id.starts_with("iss-"));

  let recall = &report.issues[2];
  assert_eq!(recall.severity, Severity::Critical);
  assert_eq!(recall.workaround.as_deref(), Some("Free replacement power supply"));
  assert_eq!(report.critical_issue_count(), 1);

  assert!(report.recall_summary.has_recalls);
  assert_eq!(report.recall_summary.recall_count, 1);
  assert!(report.repair_summary.found);
  assert_eq!(report.repair_summary.repairability_score, Some(4));
  assert_eq!(report.repair_summary.guides_count, Some(12));

  assert_eq!(report.positives[0].title, "Well-documented repairs (12 guides available)");
  assert_eq!(report.positives.len(), 4);

  let snapshot = report.score.unwrap();
  assert_eq!(snapshot.score.breakdown.recall_penalty, 20.0);
  assert_eq!(snapshot.score.breakdown.repairability_adjustment, -1.5);
  assert!(snapshot.score.score < 30);
  assert_eq!(snapshot.score.grade, Grade::F);
  // 5 issue mentions + 1 recall + 15 positive mentions + 1 repair
  assert_eq!(snapshot.score.data_points, 22);
  assert_eq!(snapshot.score.confidence, Confidence::Low);
  assert_eq!(snapshot.ruleset_version, "2024.1");
}

#[test]
fn loosely_typed_feed_records_are_accepted_or_dropped_one_by_one() {
  let json = r#"{
    "product_id": "mon-odyssey-g9",
    "category": "monitors",
    "as_of": "2024-05-01T00:00:00Z",
    "evidence": [
      {"source": "cpsc", "title": "Stand tip-over", "timestamp": "2024-01-15", "recall_id": "24-200",
       "hazard": "Tip-over hazard", "injury": "Yes"},
      {"source": "reddit", "title": "Flicker", "content": "flicker at 240Hz", "date": "2024-03-02",
       "sentiment": "negative", "upvotes": "12"},
      {"source": "reddit", "title": 42, "content": "flicker again", "date": "2024-03-03", "sentiment": "negative"},
      {"source": "reddit", "title": "Still flickering", "content": "flicker after firmware", "date": "2024-03-04",
       "sentiment": "negative", "upvotes": 3}
    ]
  }"#;
  let bundle: EvidenceBundle = serde_json::from_str(json).unwrap();
  assert_eq!(bundle.category.as_deref(), Some("monitors"));
  assert_eq!(bundle.evidence.len(), 4);

  let report = Engine::with_defaults().assess(&bundle).unwrap();
  assert_eq!(report.records_accepted, 3);
  assert_eq!(report.records_dropped, 1);

  let recall = report.issues.iter().find(|i| i.title.starts_with("RECALL")).unwrap();
  assert_eq!(recall.severity, Severity::Critical);
  let flicker = report.issues.iter().find(|i| i.title.contains("Flicker")).unwrap();
  assert_eq!(flicker.mention_count, 2);
}

#[test]
fn deterministic_output_across_runs() {
  let bundle = fixture_bundle();
  let json1 = serde_json::to_string(&Engine::with_defaults().assess(&bundle).unwrap()).unwrap();
  let json2 = serde_json::to_string(&Engine::with_defaults().assess(&bundle).unwrap()).unwrap();
  assert_eq!(json1, json2, "Same inputs must produce identical JSON output");
}

#[test]
fn report_json_shape() {
  let report = Engine::with_defaults().assess(&fixture_bundle()).unwrap();
  let value = serde_json::to_value(&report).unwrap();

  let score = &value["score"];
  assert_eq!(score["grade"], "F");
  assert_eq!(score["confidence"], "low");
  assert_eq!(score["trend_period"], "90d");
  assert!(score["breakdown"]["issue_penalty"].is_number());
  assert_eq!(value["issues"][0]["frequency"], "very_common");
  assert_eq!(value["issues"][0]["status"], "ongoing");
}

#[test]
fn unknown_fields_are_ignored() {
  let json = r#"{
    "product_id": "kb-1",
    "evidence": [
      {"source": "discussion", "text": "best keyboard", "timestamp": "2024-01-01T00:00:00Z",
       "sentiment": "positive", "subreddit": "MechanicalKeyboards", "awards": 3}
    ],
    "retailer": "keyboards-r-us"
  }"#;
  let bundle: EvidenceBundle = serde_json::from_str(json).unwrap();
  let report = Engine::with_defaults().assess(&bundle).unwrap();
  assert_eq!(report.positives.len(), 1);
  assert_eq!(report.records_dropped, 0);
}

#[test]
fn no_evidence_means_insufficient_data() {
  let bundle: EvidenceBundle = serde_json::from_str(r#"{"product_id": "ghost"}"#).unwrap();
  let report = Engine::with_defaults().assess(&bundle).unwrap();
  assert!(report.score.is_none());
  assert!(report.issues.is_empty());
  assert!(!report.recall_summary.has_recalls);
  assert!(!report.repair_summary.found);
}

#[test]
fn neutral_only_discussion_is_insufficient_data() {
  let json = r#"{
    "product_id": "kb-2",
    "evidence": [{"source": "discussion", "text": "which switches?", "timestamp": "2024-01-01"}]
  }"#;
  let bundle: EvidenceBundle = serde_json::from_str(json).unwrap();
  let report = Engine::with_defaults().assess(&bundle).unwrap();
  assert_eq!(report.records_accepted, 1);
  assert!(report.score.is_none());
}

#[test]
fn ruleset_override_changes_grade_and_version() {
  let strict = Config::from_json_str(
    r#"{"version": "strict-1", "grades": {"a": 99, "b_plus": 95, "b": 90, "c_plus": 85, "c": 80, "d": 75}}"#,
  )
  .unwrap();
  let bundle: EvidenceBundle = serde_json::from_str(
    r#"{"product_id": "p", "as_of": "2024-05-01T00:00:00Z", "evidence": [
      {"source": "discussion", "text": "scan line in dark scenes", "timestamp": "2024-01-01", "sentiment": "negative"},
      {"source": "discussion", "text": "amazing", "timestamp": "2024-01-01", "sentiment": "positive"}
    ]}"#,
  )
  .unwrap();

  let default_report = Engine::with_defaults().assess(&bundle).unwrap();
  let strict_report = Engine::new(strict).assess(&bundle).unwrap();

  let d = default_report.score.unwrap();
  let s = strict_report.score.unwrap();
  // 100 - 3 (one low issue) + 0.02
  assert_eq!(d.score.score, 97);
  assert_eq!(s.score.score, 97);
  assert_eq!(d.score.grade, Grade::A);
  assert_eq!(s.score.grade, Grade::BPlus);
  assert_eq!(s.ruleset_version, "strict-1");
}

#[test]
fn invalid_ruleset_rejected() {
  let err = Config::from_json_str(r#"{"grades": {"a": 50, "b_plus": 80}}"#).unwrap_err();
  assert!(err.to_string().contains("grade"), "{}", err);
}

#[test]
fn recompute_from_fixture_directory() {
  let dir = tempfile::tempdir().unwrap();
  let recalls = FixtureFetcher::new(Source::Recall, dir.path());
  let repair = FixtureFetcher::new(Source::RepairDb, dir.path());
  let posts = FixtureFetcher::new(Source::Discussion, dir.path());

  let recall_path = recalls.path_for("Odyssey G9", Some("Samsung"));
  fs::create_dir_all(recall_path.parent().unwrap()).unwrap();
  fs::write(
    &recall_path,
    r#"[{"title": "Stand tip-over", "timestamp": "2024-01-15", "recall_id": "24-200",
         "hazard": "Tip-over hazard", "injury": true}]"#,
  )
  .unwrap();

  let product = ProductRef {
    id: "mon-odyssey-g9".into(),
    name: "Odyssey G9".into(),
    brand: Some("Samsung".into()),
    category: Some("monitors".into()),
  };
  let fetchers: [&dyn EvidenceFetcher; 3] = [&posts, &recalls, &repair];
  let store = MemoryStore::new();
  let report = Engine::with_defaults().recompute(&product, &fetchers, &store).unwrap();

  assert_eq!(report.issues.len(), 1);
  assert_eq!(report.issues[0].severity, Severity::Critical);
  let latest = store.latest_score("mon-odyssey-g9").unwrap().unwrap();
  // 100 - 25 - 20
  assert_eq!(latest.score.score, 55);
  assert_eq!(latest.score.grade, Grade::C);
  assert_eq!(store.issues("mon-odyssey-g9").unwrap().len(), 1);
}
