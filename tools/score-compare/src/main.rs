//! score-compare: side-by-side reliability comparison for buying decisions
//!
//! Usage:
//!   score-compare <report1> <report2> [... <report5>]   # table + recommendation
//!   score-compare <report1> <report2> -j                # same, as JSON
//!
//! Each file is a product report as written by `reliability-engine` (one JSON
//! object) or served by `reliability-feed` at `/products/:id`. The highest
//! score wins; a winner with critical issues carries a warning.

use std::env;
use std::fs;
use std::process;

use reliability_engine::types::{Issue, ScoreSnapshot, Severity};
use serde::{Deserialize, Serialize};

const MIN_REPORTS: usize = 2;
const MAX_REPORTS: usize = 5;

/// The fields both report shapes share.
#[derive(Deserialize)]
struct ReportFile {
    product_id: String,
    #[serde(default)]
    score: Option<ScoreSnapshot>,
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Serialize)]
struct Row {
    product_id: String,
    score: Option<u8>,
    grade: Option<&'static str>,
    confidence: Option<&'static str>,
    critical_issues: usize,
    total_issues: usize,
}

#[derive(Debug, Serialize, PartialEq)]
struct Recommendation {
    winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    reason: String,
}

#[derive(Serialize)]
struct Comparison {
    comparison: Vec<Row>,
    recommendation: Recommendation,
}

fn load_report(path: &str) -> ReportFile {
    let contents = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("score-compare: cannot read {}: {}", path, e);
        process::exit(2);
    });
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        eprintln!("score-compare: invalid report in {}: {}", path, e);
        process::exit(2);
    })
}

fn row(report: &ReportFile) -> Row {
    Row {
        product_id: report.product_id.clone(),
        score: report.score.as_ref().map(|s| s.score.score),
        grade: report.score.as_ref().map(|s| s.score.grade.as_str()),
        confidence: report.score.as_ref().map(|s| s.score.confidence.as_str()),
        critical_issues: report
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count(),
        total_issues: report.issues.len(),
    }
}

/// Highest score wins; ties go to the earlier report.
fn recommend(rows: &[Row]) -> Recommendation {
    let mut best: Option<(&Row, u8)> = None;
    for r in rows {
        if let Some(s) = r.score {
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((r, s));
            }
        }
    }

    let Some((winner, score)) = best else {
        return Recommendation {
            winner: None,
            score: None,
            warning: None,
            reason: "insufficient data".into(),
        };
    };

    if winner.critical_issues > 0 {
        Recommendation {
            winner: Some(winner.product_id.clone()),
            score: Some(score),
            warning: Some(format!("has {} critical issue(s)", winner.critical_issues)),
            reason: "highest score but has critical issues to consider".into(),
        }
    } else {
        Recommendation {
            winner: Some(winner.product_id.clone()),
            score: Some(score),
            warning: None,
            reason: "highest reliability score with no critical issues".into(),
        }
    }
}

fn print_table(rows: &[Row], rec: &Recommendation) {
    let width = rows
        .iter()
        .map(|r| r.product_id.len())
        .max()
        .unwrap_or(0)
        .max("product".len());

    println!(
        "{:<width$}  {:>5}  {:<5}  {:<10}  {:>8}",
        "product", "score", "grade", "confidence", "critical"
    );
    for r in rows {
        let score = r.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<width$}  {:>5}  {:<5}  {:<10}  {:>8}",
            r.product_id,
            score,
            r.grade.unwrap_or("-"),
            r.confidence.unwrap_or("-"),
            r.critical_issues
        );
    }
    println!();

    match &rec.winner {
        Some(w) => println!("Recommendation: {} ({})", w, rec.reason),
        None => println!("Recommendation: none ({})", rec.reason),
    }
    if let Some(warning) = &rec.warning {
        println!("Warning: {}", warning);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let json = args.iter().any(|a| a == "-j" || a == "--json");
    let files: Vec<_> = args.iter().skip(1).filter(|a| !a.starts_with('-')).collect();

    if !(MIN_REPORTS..=MAX_REPORTS).contains(&files.len()) {
        eprintln!("Usage: score-compare <report1> <report2> [... <report5>] [-j|--json]");
        eprintln!("  -j  Print the comparison as JSON");
        process::exit(2);
    }

    let rows: Vec<Row> = files.iter().map(|f| row(&load_report(f))).collect();
    let recommendation = recommend(&rows);

    if json {
        let out = Comparison {
            comparison: rows,
            recommendation,
        };
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("score-compare: {}", e);
                process::exit(2);
            }
        }
    } else {
        print_table(&rows, &recommendation);
    }
}
