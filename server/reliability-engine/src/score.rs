//! Reliability score: base, issue/recall penalties, repairability, positives.

use crate::config::Config;
use crate::error::EngineError;
use crate::types::*;

/// Combine extracted items and source summaries into a bounded score.
///
/// Pure. Each term may push the running total out of 0..=100; only the final
/// value is clamped. Invalid inputs are rejected, never clamped.
pub fn score(
  issues: &[Issue],
  positives: &[Positive],
  recalls: &RecallSummary,
  repair: &RepairSummary,
  config: &Config,
) -> Result<ReliabilityScore, EngineError> {
  validate_inputs(recalls, repair)?;
  let rules = &config.scoring;
  let mut data_points: u64 = 0;

  // Issue penalty: severity weight scaled by log10(mentions), capped in total.
  let mut issue_penalty = 0.0;
  for issue in issues {
    let mentions = issue.mention_count.max(1) as f64;
    let multiplier = 1.0 + mentions.log10() * rules.mention_log_factor;
    issue_penalty += rules.severity_weights.weight(issue.severity) * multiplier;
    data_points += u64::from(issue.mention_count);
  }
  let issue_penalty = issue_penalty.min(rules.issue_penalty_cap);

  let recall_penalty = if recalls.has_recalls {
    data_points += u64::from(recalls.recall_count);
    (f64::from(recalls.recall_count) * rules.recall_penalty_each).min(rules.recall_penalty_cap)
  } else {
    0.0
  };

  // Signed: a neutral repairability contributes nothing.
  let repairability_adjustment = match repair.repairability_score {
    Some(s) if repair.found => {
      data_points += 1;
      (f64::from(s) - rules.repair_neutral) * rules.repair_factor
    }
    _ => 0.0,
  };

  let mut positive_bonus = 0.0;
  for positive in positives {
    positive_bonus +=
      (f64::from(positive.mention_count) * rules.positive_mention_weight).min(rules.positive_each_cap);
    data_points += u64::from(positive.mention_count);
  }
  let positive_bonus = positive_bonus.min(rules.positive_total_cap);

  let raw = rules.base - issue_penalty - recall_penalty + repairability_adjustment + positive_bonus;
  let value = raw.clamp(0.0, 100.0).round() as u8;

  Ok(ReliabilityScore {
    score: value,
    grade: grade_for(value, config),
    confidence: confidence_for(data_points, config),
    data_points,
    breakdown: ScoreBreakdown {
      issue_penalty: one_decimal(issue_penalty),
      recall_penalty: one_decimal(recall_penalty),
      repairability_adjustment: one_decimal(repairability_adjustment),
      positive_bonus: one_decimal(positive_bonus),
    },
  })
}

/// Letter grade from fixed breakpoints. Monotonic in `score`.
pub fn grade_for(score: u8, config: &Config) -> Grade {
  let g = &config.grades;
  if score >= g.a {
    Grade::A
  } else if score >= g.b_plus {
    Grade::BPlus
  } else if score >= g.b {
    Grade::B
  } else if score >= g.c_plus {
    Grade::CPlus
  } else if score >= g.c {
    Grade::C
  } else if score >= g.d {
    Grade::D
  } else {
    Grade::F
  }
}

/// Evidence volume only; says nothing about whether the score is good.
pub fn confidence_for(data_points: u64, config: &Config) -> Confidence {
  let c = &config.confidence;
  if data_points > c.high_above {
    Confidence::High
  } else if data_points > c.medium_above {
    Confidence::Medium
  } else {
    Confidence::Low
  }
}

fn validate_inputs(recalls: &RecallSummary, repair: &RepairSummary) -> Result<(), EngineError> {
  if let Some(s) = repair.repairability_score {
    if s > 10 {
      return Err(EngineError::validation(
        "repair_summary.repairability_score",
        &format!("{} is outside 0..=10", s),
      ));
    }
  }
  if (recalls.recall_count as usize) < recalls.recalls.len() {
    return Err(EngineError::validation(
      "recall_summary.recall_count",
      "smaller than the number of listed recalls",
    ));
  }
  if recalls.recall_count > 0 && !recalls.has_recalls {
    return Err(EngineError::validation(
      "recall_summary.has_recalls",
      "false while recall_count is positive",
    ));
  }
  Ok(())
}

fn one_decimal(v: f64) -> f64 {
  (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  fn issue(severity: Severity, mention_count: u32) -> Issue {
    Issue {
      id: "iss-test".into(),
      title: "test".into(),
      description: String::new(),
      severity,
      frequency: Frequency::Common,
      affected_percentage: 0.0,
      mention_count,
      source_urls: Vec::new(),
      first_reported: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
      status: IssueStatus::Ongoing,
      workaround: None,
    }
  }

  fn positive(mention_count: u32) -> Positive {
    Positive {
      id: "pos-test".into(),
      title: "test".into(),
      frequency: Frequency::Common,
      mention_count,
    }
  }

  fn repair(score: u8) -> RepairSummary {
    RepairSummary {
      found: true,
      repairability_score: Some(score),
      guides_count: Some(0),
      source_url: None,
    }
  }

  fn recalls(n: u32) -> RecallSummary {
    RecallSummary {
      has_recalls: n > 0,
      recall_count: n,
      recalls: Vec::new(),
    }
  }

  #[test]
  fn reference_scenario() {
    let config = Config::default();
    let issues = vec![issue(Severity::High, 150), issue(Severity::Low, 50)];
    let positives = vec![positive(200), positive(100)];
    let s = score(&issues, &positives, &recalls(0), &repair(6), &config).unwrap();

    // 15 * (1 + 0.3 * log10 150) + 3 * (1 + 0.3 * log10 50) = 29.32
    assert_eq!(s.breakdown.issue_penalty, 29.3);
    assert_eq!(s.breakdown.recall_penalty, 0.0);
    assert_eq!(s.breakdown.repairability_adjustment, 1.5);
    // min(4, 3) + min(2, 3) = 5, under the cap of 10
    assert_eq!(s.breakdown.positive_bonus, 5.0);
    // 100 - 29.32 + 1.5 + 5 = 77.18
    assert_eq!(s.score, 77);
    assert_eq!(s.grade, Grade::B);
    assert_eq!(s.data_points, 150 + 50 + 1 + 200 + 100);
    assert_eq!(s.confidence, Confidence::High);
  }

  #[test]
  fn issue_penalty_capped_at_sixty() {
    let config = Config::default();
    let issues: Vec<_> = (0..5).map(|_| issue(Severity::Critical, 1000)).collect();
    let s = score(&issues, &[], &recalls(0), &RepairSummary::default(), &config).unwrap();
    assert_eq!(s.breakdown.issue_penalty, 60.0);
    assert_eq!(s.score, 40);
    assert_eq!(s.grade, Grade::D);
  }

  #[test]
  fn recall_penalty_capped() {
    let config = Config::default();
    let s = score(&[], &[], &recalls(3), &RepairSummary::default(), &config).unwrap();
    assert_eq!(s.breakdown.recall_penalty, 40.0);
    assert_eq!(s.data_points, 3);

    let s = score(&[], &[], &recalls(1), &RepairSummary::default(), &config).unwrap();
    assert_eq!(s.breakdown.recall_penalty, 20.0);
  }

  #[test]
  fn repairability_is_signed() {
    let config = Config::default();
    let none = RecallSummary::default();
    assert_eq!(score(&[], &[], &none, &repair(5), &config).unwrap().breakdown.repairability_adjustment, 0.0);
    assert_eq!(score(&[], &[], &none, &repair(1), &config).unwrap().breakdown.repairability_adjustment, -6.0);
    assert_eq!(score(&[], &[], &none, &repair(10), &config).unwrap().breakdown.repairability_adjustment, 7.5);
  }

  #[test]
  fn repair_score_ignored_when_not_found() {
    let config = Config::default();
    let mut r = repair(9);
    r.found = false;
    let s = score(&[], &[], &RecallSummary::default(), &r, &config).unwrap();
    assert_eq!(s.breakdown.repairability_adjustment, 0.0);
    assert_eq!(s.data_points, 0);
  }

  #[test]
  fn positive_bonus_capped_at_ten() {
    let config = Config::default();
    let positives: Vec<_> = (0..6).map(|_| positive(1000)).collect();
    let s = score(&[], &positives, &RecallSummary::default(), &RepairSummary::default(), &config).unwrap();
    assert_eq!(s.breakdown.positive_bonus, 10.0);
    assert_eq!(s.score, 100);
  }

  #[test]
  fn score_clamped_to_zero() {
    let config = Config::default();
    let issues: Vec<_> = (0..5).map(|_| issue(Severity::Critical, 10)).collect();
    let s = score(&issues, &[], &recalls(2), &repair(0), &config).unwrap();
    // 100 - 60 - 40 - 7.5 -> clamped
    assert_eq!(s.score, 0);
    assert_eq!(s.grade, Grade::F);
  }

  #[test]
  fn penalty_never_decreases_with_mentions() {
    let config = Config::default();
    let none = RecallSummary::default();
    let empty = RepairSummary::default();
    let mut prev = 0.0;
    for n in [0, 1, 2, 10, 99, 100, 101, 1_000, 50_000] {
      let s = score(&[issue(Severity::Medium, n)], &[], &none, &empty, &config).unwrap();
      assert!(s.breakdown.issue_penalty >= prev);
      prev = s.breakdown.issue_penalty;
    }
  }

  #[test]
  fn grade_breakpoints() {
    let config = Config::default();
    let cases = [
      (100, Grade::A),
      (90, Grade::A),
      (89, Grade::BPlus),
      (80, Grade::BPlus),
      (79, Grade::B),
      (70, Grade::B),
      (60, Grade::CPlus),
      (50, Grade::C),
      (40, Grade::D),
      (39, Grade::F),
      (0, Grade::F),
    ];
    for (s, g) in cases {
      assert_eq!(grade_for(s, &config), g, "score {s}");
    }
  }

  #[test]
  fn confidence_thresholds() {
    let config = Config::default();
    assert_eq!(confidence_for(501, &config), Confidence::High);
    assert_eq!(confidence_for(500, &config), Confidence::Medium);
    assert_eq!(confidence_for(101, &config), Confidence::Medium);
    assert_eq!(confidence_for(100, &config), Confidence::Low);
  }

  #[test]
  fn out_of_range_repair_score_rejected() {
    let config = Config::default();
    let err = score(&[], &[], &RecallSummary::default(), &repair(11), &config).unwrap_err();
    assert!(err.to_string().contains("repairability_score"));
  }

  #[test]
  fn inconsistent_recall_summary_rejected() {
    let config = Config::default();
    let bad = RecallSummary {
      has_recalls: false,
      recall_count: 2,
      recalls: Vec::new(),
    };
    let err = score(&[], &[], &bad, &RepairSummary::default(), &config).unwrap_err();
    assert!(err.to_string().contains("has_recalls"));
  }
}
