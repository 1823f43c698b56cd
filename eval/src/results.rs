//! Result capture and persistence.
//!
//! Each case run gets a directory under `results/<case_id>/<run_id>/` holding
//! `score.json`, `transcript.jsonl`, and `meta.json` for later aggregation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use harness::core::state::{Termination, TurnRecord};
use harness::io::fixture::TestCase;
use harness::io::transcript::write_transcript;

use crate::score::ScoreReport;

/// Metadata for one case run, persisted to `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub case_id: String,
    pub run_id: String,
    /// SHA-256 over the fixture directory for reproducibility tracking.
    pub fixture_hash: String,
    pub termination: Option<Termination>,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub steps_taken: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal errors encountered during capture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capture_errors: Vec<String>,
}

/// Input for capturing one completed case run.
#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub case: &'a TestCase,
    pub run_id: &'a str,
    pub report: &'a ScoreReport,
    pub transcript: &'a [TurnRecord],
    pub termination: Option<Termination>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Generate a fresh run id: `run-<UTC timestamp>_<random suffix>`.
pub fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix: String = {
        let mut rng = rand::thread_rng();
        std::iter::repeat_with(|| rng.sample(Alphanumeric))
            .map(char::from)
            .take(6)
            .collect::<String>()
            .to_lowercase()
    };
    format!("run-{timestamp}_{suffix}")
}

pub fn results_dir(base: &Path, case_id: &str, run_id: &str) -> PathBuf {
    base.join(case_id).join(run_id)
}

/// Capture artifacts for one run to the results directory.
///
/// Capture problems are recorded inside `meta.json` rather than failing the
/// run; only the inability to write the directory itself is an error.
#[instrument(skip_all, fields(case_id = %input.case.id, run_id = %input.run_id))]
pub fn capture_run(base: &Path, input: &CaptureInput<'_>) -> Result<PathBuf> {
    let dir = results_dir(base, &input.case.id, input.run_id);
    fs::create_dir_all(&dir).with_context(|| format!("create results dir {}", dir.display()))?;

    let mut capture_errors = Vec::new();

    let fixture_hash = match fixture_sha256(&input.case.root) {
        Ok(hash) => hash,
        Err(err) => {
            capture_errors.push(format!("fixture hash: {err:#}"));
            String::new()
        }
    };

    if let Err(err) = write_json(&dir.join("score.json"), input.report) {
        capture_errors.push(format!("score.json: {err:#}"));
    }
    if let Err(err) = write_transcript(&dir.join("transcript.jsonl"), input.transcript) {
        capture_errors.push(format!("transcript: {err:#}"));
    }

    if !capture_errors.is_empty() {
        warn!(errors = ?capture_errors, "artifact capture had errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = RunMeta {
        case_id: input.case.id.clone(),
        run_id: input.run_id.to_string(),
        fixture_hash,
        termination: input.termination,
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        steps_taken: input.report.steps_taken,
        error: input.report.error.clone(),
        capture_errors,
    };
    write_json(&dir.join("meta.json"), &meta)?;
    debug!(results_dir = %dir.display(), "results captured");
    Ok(dir)
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Deterministic digest over every file in the fixture directory.
fn fixture_sha256(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut paths = Vec::new();
    collect_files(dir, dir, &mut paths)?;
    paths.sort();
    for rel in paths {
        let full = dir.join(&rel);
        let contents =
            fs::read(&full).with_context(|| format!("read {}", full.display()))?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(&contents);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .context("fixture file outside root")?
                .to_path_buf();
            out.push(rel);
        }
    }
    Ok(())
}
