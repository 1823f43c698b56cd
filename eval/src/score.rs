//! 4-tier scoring rubric.
//!
//! Tiers 1 and 2 are pure, deterministic checks over the generated document;
//! tiers 3 and 4 are delegated to the injected [`Judge`]. A judge failure
//! degrades the affected sub-score to 0 and is recorded as a diagnostic, never
//! an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use harness::core::protocol::GeneratedDoc;
use harness::io::fixture::{Facts, TestCase};

use crate::judge::{Criterion, Judge, JudgeRequest};

pub const TIER1_MAX: f64 = 15.0;
pub const TIER2_MAX: f64 = 25.0;
pub const TIER3_MAX: f64 = 30.0;
pub const TIER4_MAX: f64 = 30.0;
pub const TOTAL_MAX: f64 = 100.0;

/// Readme shorter than this earns no length credit.
const README_LENGTH_FLOOR: usize = 100;

const SCHEMA_ORG_KEYS: [&str; 5] = [
    "@context",
    "@type",
    "name",
    "description",
    "programmingLanguage",
];

const INSTALL_KEYWORDS: [&str; 4] = ["install", "pip", "requirements", "setup"];
const USAGE_KEYWORDS: [&str; 4] = ["usage", "run", "execute", "command"];
const EXAMPLE_KEYWORDS: [&str; 4] = ["example", "output", "demo", "```"];

const INSTALL_POINTS: f64 = 8.0;
const USAGE_POINTS: f64 = 9.0;
const EXAMPLE_POINTS: f64 = 8.0;

const PURPOSE_POINTS: f64 = 12.0;
const DEPENDENCIES_POINTS: f64 = 10.0;
const RUN_COMMAND_POINTS: f64 = 8.0;

const CLARITY_POINTS: f64 = 12.0;
const COMPLETENESS_POINTS: f64 = 10.0;
const FORMATTING_POINTS: f64 = 8.0;

/// Per-tier score breakdown.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TierBreakdown {
    pub tier1: f64,
    pub tier2: f64,
    pub tier3: f64,
    pub tier4: f64,
}

impl TierBreakdown {
    pub fn total(&self) -> f64 {
        (self.tier1 + self.tier2 + self.tier3 + self.tier4).min(TOTAL_MAX)
    }
}

/// Per-case score report, persisted as `score.json` and aggregated into the
/// run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    pub case_id: String,
    pub breakdown: TierBreakdown,
    pub total: f64,
    pub steps_taken: u32,
    /// Wall-clock time for the episode plus scoring.
    pub elapsed_secs: f64,
    /// Terminal failure reason, absent for responded episodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal degradations (judge failures, capture problems).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl ScoreReport {
    /// Zero-scored report for a case that never produced a document.
    pub fn failure(case_id: &str, steps_taken: u32, elapsed_secs: f64, reason: String) -> Self {
        Self {
            case_id: case_id.to_string(),
            breakdown: TierBreakdown::default(),
            total: 0.0,
            steps_taken,
            elapsed_secs,
            error: Some(reason),
            diagnostics: Vec::new(),
        }
    }
}

/// Score a generated document against a test case.
///
/// An absent document short-circuits to all zeros. Tiers 1–2 are
/// deterministic and side-effect-free; tiers 3–4 call into the judge once per
/// sub-criterion.
#[instrument(skip_all, fields(case_id = %case.id, doc_present = doc.is_some()))]
pub fn score_doc(
    doc: Option<&GeneratedDoc>,
    case: &TestCase,
    judge: &dyn Judge,
) -> (TierBreakdown, Vec<String>) {
    let Some(doc) = doc else {
        return (TierBreakdown::default(), Vec::new());
    };

    let tier1 = tier1_structural(doc);
    let tier2 = tier2_sections(&doc.readme);
    let (tier3, mut diagnostics) = tier3_accuracy(judge, &doc.readme, &case.ground_truth.facts);
    let (tier4, quality_diagnostics) = tier4_quality(judge, &doc.readme);
    diagnostics.extend(quality_diagnostics);

    let breakdown = TierBreakdown {
        tier1,
        tier2,
        tier3,
        tier4,
    };
    debug!(total = breakdown.total(), "scored document");
    (breakdown, diagnostics)
}

/// Tier 1: structural checks, no external calls.
pub fn tier1_structural(doc: &GeneratedDoc) -> f64 {
    let mut score = 0.0;
    if doc.metadata.is_object() {
        score += 5.0;
    }
    if doc.readme.chars().count() > README_LENGTH_FLOOR {
        score += 5.0;
    }
    if doc.metadata.is_object()
        && SCHEMA_ORG_KEYS
            .iter()
            .all(|key| doc.metadata.get(key).is_some())
    {
        score += 5.0;
    }
    score
}

/// Tier 2: required-section detection by case-insensitive substring match.
/// Each sub-criterion is all-or-nothing.
pub fn tier2_sections(readme: &str) -> f64 {
    let lower = readme.to_lowercase();
    let mut score = 0.0;
    if contains_any(&lower, &INSTALL_KEYWORDS) {
        score += INSTALL_POINTS;
    }
    if contains_any(&lower, &USAGE_KEYWORDS) {
        score += USAGE_POINTS;
    }
    if contains_any(&lower, &EXAMPLE_KEYWORDS) {
        score += EXAMPLE_POINTS;
    }
    score
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn tier3_accuracy(judge: &dyn Judge, readme: &str, facts: &Facts) -> (f64, Vec<String>) {
    let mut diagnostics = Vec::new();
    let mut total = 0.0;
    for (criterion, reference, max) in [
        (
            Criterion::Purpose,
            facts.main_purpose.clone(),
            PURPOSE_POINTS,
        ),
        (
            Criterion::Dependencies,
            facts.dependencies.join(", "),
            DEPENDENCIES_POINTS,
        ),
        (
            Criterion::RunCommand,
            facts.run_command.clone(),
            RUN_COMMAND_POINTS,
        ),
    ] {
        total += judged(judge, criterion, reference, readme, max, &mut diagnostics);
    }
    (total, diagnostics)
}

fn tier4_quality(judge: &dyn Judge, readme: &str) -> (f64, Vec<String>) {
    let mut diagnostics = Vec::new();
    let mut total = 0.0;
    for (criterion, max) in [
        (Criterion::Clarity, CLARITY_POINTS),
        (Criterion::Completeness, COMPLETENESS_POINTS),
        (Criterion::Formatting, FORMATTING_POINTS),
    ] {
        total += judged(judge, criterion, String::new(), readme, max, &mut diagnostics);
    }
    (total, diagnostics)
}

fn judged(
    judge: &dyn Judge,
    criterion: Criterion,
    reference: String,
    readme: &str,
    max_points: f64,
    diagnostics: &mut Vec<String>,
) -> f64 {
    let request = JudgeRequest {
        criterion,
        reference,
        readme,
        max_points,
    };
    match judge.assess(&request) {
        Ok(score) => score.clamp(0.0, max_points),
        Err(err) => {
            diagnostics.push(format!("judge failed on {}: {err:#}", criterion.as_str()));
            0.0
        }
    }
}
