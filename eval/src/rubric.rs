//! Rubric calibration mode.
//!
//! Scores three fixed synthetic documents against an embedded calibration
//! case and checks that each total lands inside its expected range. This is a
//! self-test of the scorer's calibration, not of any participant.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use harness::core::protocol::GeneratedDoc;
use harness::io::fixture::{Facts, GroundTruth, ProjectMetadata, TestCase};

use crate::judge::Judge;
use crate::score::{TierBreakdown, score_doc};

const PERFECT_DOC: &str = include_str!("../fixtures/rubric/perfect_documentation.json");
const PARTIAL_DOC: &str = include_str!("../fixtures/rubric/partial_documentation.json");
const MINIMAL_DOC: &str = include_str!("../fixtures/rubric/minimal_documentation.json");

/// Outcome of one calibration check.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationOutcome {
    pub fixture: String,
    pub expected_low: f64,
    pub expected_high: f64,
    pub total: f64,
    pub breakdown: TierBreakdown,
    pub passed: bool,
}

/// Score the three synthetic documents and check their expected ranges.
pub fn validate_rubric(judge: &dyn Judge) -> Result<Vec<CalibrationOutcome>> {
    let case = calibration_case();
    let checks = [
        ("perfect_documentation", PERFECT_DOC, 75.0, 100.0),
        ("partial_documentation", PARTIAL_DOC, 35.0, 65.0),
        ("minimal_documentation", MINIMAL_DOC, 15.0, 35.0),
    ];

    let mut outcomes = Vec::with_capacity(checks.len());
    for (fixture, raw, low, high) in checks {
        let doc: GeneratedDoc = serde_json::from_str(raw)
            .with_context(|| format!("parse calibration fixture {fixture}"))?;
        let (breakdown, _diagnostics) = score_doc(Some(&doc), &case, judge);
        let total = breakdown.total();
        outcomes.push(CalibrationOutcome {
            fixture: fixture.to_string(),
            expected_low: low,
            expected_high: high,
            total,
            breakdown,
            passed: (low..=high).contains(&total),
        });
    }
    Ok(outcomes)
}

/// Fixed case the calibration documents are judged against. The root path is
/// never touched: calibration only exercises the scorer.
fn calibration_case() -> TestCase {
    TestCase {
        id: "rubric_calibration".to_string(),
        root: PathBuf::new(),
        metadata: ProjectMetadata {
            name: "word_counter".to_string(),
            description: "Command-line word frequency counter".to_string(),
            language: "Python".to_string(),
            domain: "text processing".to_string(),
            files: vec!["wordcount.py".to_string()],
        },
        ground_truth: GroundTruth {
            readme: "# word_counter\n\nCounts word frequencies in text files.\n".to_string(),
            facts: Facts {
                main_purpose:
                    "Count word frequencies in text files and print the most common words"
                        .to_string(),
                dependencies: Vec::new(),
                run_command: "python wordcount.py input.txt".to_string(),
                key_features: vec![
                    "word frequency counting".to_string(),
                    "top-N report".to_string(),
                ],
                must_mention: vec!["word".to_string(), "count".to_string()],
                main_file: "wordcount.py".to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::HeuristicJudge;

    #[test]
    fn all_calibration_ranges_pass_with_heuristic_judge() {
        let outcomes = validate_rubric(&HeuristicJudge).expect("validate");
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(
                outcome.passed,
                "{} scored {} outside [{}, {}]",
                outcome.fixture, outcome.total, outcome.expected_low, outcome.expected_high
            );
        }
    }

    #[test]
    fn perfect_documentation_maxes_the_deterministic_tiers() {
        let outcomes = validate_rubric(&HeuristicJudge).expect("validate");
        let perfect = &outcomes[0];
        assert_eq!(perfect.breakdown.tier1, 15.0);
        assert_eq!(perfect.breakdown.tier2, 25.0);
    }

    #[test]
    fn minimal_documentation_is_short_and_incomplete() {
        let outcomes = validate_rubric(&HeuristicJudge).expect("validate");
        let minimal = &outcomes[2];
        // 5 for shape only: short readme, metadata missing @context.
        assert_eq!(minimal.breakdown.tier1, 5.0);
        assert!(minimal.total < 35.0);
    }
}
