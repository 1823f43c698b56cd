//! Aggregation over persisted case results.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use harness::core::state::Termination;

use crate::results::RunMeta;
use crate::score::ScoreReport;

/// Aggregated view of one case's persisted runs.
#[derive(Debug, Default)]
pub struct CaseSummary {
    pub runs: usize,
    pub responded: usize,
    pub step_limit: usize,
    pub malformed: usize,
    pub errors: usize,
    pub avg_total: Option<f64>,
    pub avg_duration_secs: Option<f64>,
}

pub fn load_run_dirs(case_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !case_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(case_results_dir)
        .with_context(|| format!("read {}", case_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Aggregate every persisted run of a case. Unreadable runs are skipped with
/// a warning rather than failing the report.
pub fn aggregate(case_results_dir: &Path) -> Result<(CaseSummary, Vec<String>)> {
    let mut summary = CaseSummary::default();
    let mut warnings = Vec::new();

    for run_dir in load_run_dirs(case_results_dir)? {
        let meta: RunMeta = match read_json(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!("skip {}: meta.json invalid ({err:#})", run_dir.display()));
                continue;
            }
        };
        let report: ScoreReport = match read_json(&run_dir.join("score.json")) {
            Ok(report) => report,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: score.json invalid ({err:#})",
                    run_dir.display()
                ));
                continue;
            }
        };

        summary.runs += 1;
        match meta.termination {
            Some(Termination::Responded) => summary.responded += 1,
            Some(Termination::StepLimitExceeded) => summary.step_limit += 1,
            Some(Termination::MalformedOutput) => summary.malformed += 1,
            None => summary.errors += 1,
        }

        summary.avg_total = Some(running_mean(summary.avg_total, report.total, summary.runs));
        summary.avg_duration_secs = Some(running_mean(
            summary.avg_duration_secs,
            meta.duration_secs,
            summary.runs,
        ));
    }

    Ok((summary, warnings))
}

fn running_mean(previous: Option<f64>, value: f64, count: usize) -> f64 {
    match previous {
        None => value,
        Some(avg) => (avg * (count as f64 - 1.0) + value) / count as f64,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::write_json;
    use crate::score::TierBreakdown;
    use tempfile::tempdir;

    fn write_run(dir: &Path, termination: Option<Termination>, total: f64, duration: f64) {
        fs::create_dir_all(dir).expect("run dir");
        let meta = RunMeta {
            case_id: "case".to_string(),
            run_id: "run".to_string(),
            fixture_hash: "hash".to_string(),
            termination,
            start_time: "now".to_string(),
            end_time: "later".to_string(),
            duration_secs: duration,
            steps_taken: 3,
            error: None,
            capture_errors: Vec::new(),
        };
        write_json(&dir.join("meta.json"), &meta).expect("write meta");

        let report = ScoreReport {
            case_id: "case".to_string(),
            breakdown: TierBreakdown::default(),
            total,
            steps_taken: 3,
            elapsed_secs: duration,
            error: None,
            diagnostics: Vec::new(),
        };
        write_json(&dir.join("score.json"), &report).expect("write score");
    }

    #[test]
    fn aggregates_runs_with_means_and_tallies() {
        let temp = tempdir().expect("tempdir");
        write_run(
            &temp.path().join("run1"),
            Some(Termination::Responded),
            80.0,
            5.0,
        );
        write_run(
            &temp.path().join("run2"),
            Some(Termination::StepLimitExceeded),
            0.0,
            15.0,
        );

        let (summary, warnings) = aggregate(temp.path()).expect("aggregate");
        assert!(warnings.is_empty());
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.responded, 1);
        assert_eq!(summary.step_limit, 1);
        assert_eq!(summary.avg_total, Some(40.0));
        assert_eq!(summary.avg_duration_secs, Some(10.0));
    }

    #[test]
    fn invalid_runs_are_skipped_with_warning() {
        let temp = tempdir().expect("tempdir");
        write_run(
            &temp.path().join("run1"),
            Some(Termination::Responded),
            80.0,
            5.0,
        );
        let broken = temp.path().join("run2");
        fs::create_dir_all(&broken).expect("run dir");
        fs::write(broken.join("meta.json"), "not json").expect("write");

        let (summary, warnings) = aggregate(temp.path()).expect("aggregate");
        assert_eq!(summary.runs, 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn missing_case_dir_aggregates_empty() {
        let temp = tempdir().expect("tempdir");
        let (summary, warnings) = aggregate(&temp.path().join("nope")).expect("aggregate");
        assert_eq!(summary.runs, 0);
        assert!(warnings.is_empty());
        assert!(summary.avg_total.is_none());
    }
}
