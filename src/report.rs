//! QC report aggregation.
//!
//! Pure reduction over the processed row list. Rows that failed upstream
//! are counted and surfaced but never abort aggregation; averages cover
//! only rows that reached QC, with 0.0 as the all-failed convention.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::ConfigError;
use crate::qc::QcConfig;
use crate::row::Row;

/// Issues recurring in at least this many rows earn a recommendation.
const RECOMMENDATION_THRESHOLD: usize = 2;
/// Average score below which the overall-quality recommendation fires.
const SCORE_RECOMMENDATION_FLOOR: f64 = 80.0;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_articles: usize,
    pub passed_qc: usize,
    /// Rows that failed upstream and never reached QC.
    pub failed_rows: usize,
    pub average_score: f64,
    pub average_word_count: f64,
    /// Failing-check histogram across all QC'd rows.
    pub common_issues: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct DetailedResult {
    pub title: String,
    pub word_count: usize,
    pub overall_score: f64,
    pub passed: bool,
    /// Check name -> `{passed, score, details}`.
    pub checks: Map<String, Value>,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub detailed_results: Vec<DetailedResult>,
    pub recommendations: Vec<String>,
}

/// Reduces processed rows into the QC report.
pub fn aggregate(rows: &[Row], qc_config: &QcConfig) -> Report {
    let total_articles = rows.len();
    let failed_rows = rows.iter().filter(|r| r.error.is_some()).count();

    let scored: Vec<_> = rows.iter().filter_map(|r| r.qc_result.as_ref()).collect();
    let passed_qc = scored.iter().filter(|q| q.passed).count();

    let (average_score, average_word_count) = if scored.is_empty() {
        (0.0, 0.0)
    } else {
        let count = scored.len() as f64;
        (
            scored.iter().map(|q| q.overall_score).sum::<f64>() / count,
            scored.iter().map(|q| q.word_count as f64).sum::<f64>() / count,
        )
    };

    let mut common_issues: BTreeMap<String, usize> = BTreeMap::new();
    for result in &scored {
        for check in result.checks.iter().filter(|c| !c.passed) {
            *common_issues.entry(check.name.to_string()).or_default() += 1;
        }
    }

    let detailed_results = scored
        .iter()
        .map(|result| DetailedResult {
            title: result.title.clone(),
            word_count: result.word_count,
            overall_score: result.overall_score,
            passed: result.passed,
            checks: result
                .checks
                .iter()
                .map(|c| {
                    (
                        c.name.to_string(),
                        json!({
                            "passed": c.passed,
                            "score": c.score,
                            "details": c.details,
                        }),
                    )
                })
                .collect(),
            feedback: result.feedback.clone(),
        })
        .collect();

    let summary = Summary {
        total_articles,
        passed_qc,
        failed_rows,
        average_score,
        average_word_count,
        common_issues,
    };
    let recommendations = build_recommendations(&summary, qc_config);

    Report {
        summary,
        detailed_results,
        recommendations,
    }
}

fn build_recommendations(summary: &Summary, qc_config: &QcConfig) -> Vec<String> {
    let mut recommendations = Vec::new();

    if summary.passed_qc < summary.total_articles
        && summary.average_score < SCORE_RECOMMENDATION_FLOOR
    {
        recommendations.push(
            "Overall quality could be improved. Focus on the failing check categories."
                .to_string(),
        );
    }
    if summary.average_word_count > 0.0
        && summary.average_word_count < qc_config.min_word_count as f64
    {
        recommendations.push(format!(
            "Content length is below target. Aim for {}+ words per article.",
            qc_config.min_word_count
        ));
    }

    // Most frequent issues first.
    let mut issues: Vec<(&String, &usize)> = summary.common_issues.iter().collect();
    issues.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (issue, count) in issues {
        if *count >= RECOMMENDATION_THRESHOLD {
            recommendations.push(format!(
                "Address recurring {} issues across {} articles.",
                issue, count
            ));
        }
    }

    recommendations
}

/// Writes the report as pretty-printed JSON.
pub fn write_report(report: &Report, path: &Path) -> Result<(), ConfigError> {
    let rendered = serde_json::to_string_pretty(report)?;
    fs::write(path, rendered).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "QC report written");
    Ok(())
}
