//! Case execution orchestration.
//!
//! Coordinates the participant episode, the scorer, and result capture, and
//! fans independent cases out over worker threads. Every requested case
//! produces a ScoreReport; per-case failures are converted at this boundary
//! and never propagate further.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use harness::episode::{EpisodeConfig, run_episode};
use harness::io::config::BenchConfig;
use harness::io::fixture::TestCase;
use harness::io::producer::ActionProducer;

use crate::judge::Judge;
use crate::results::{CaptureInput, capture_run, generate_run_id};
use crate::score::{ScoreReport, score_doc};

/// Run-level report over every requested case.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Sum of per-case totals.
    pub overall_total: f64,
    /// Mean percentage across cases (each case is out of 100).
    pub average: f64,
    pub elapsed_seconds: f64,
    pub test_cases: Vec<ScoreReport>,
}

/// Run one case end-to-end: episode, scoring, artifact capture.
///
/// Infallible by design: episode errors and capture problems are folded into
/// the returned report.
#[instrument(skip_all, fields(case_id = %case.id))]
pub fn run_case(
    case: &TestCase,
    producer: &dyn ActionProducer,
    judge: &dyn Judge,
    config: &BenchConfig,
    results_base: Option<&Path>,
) -> ScoreReport {
    info!("case run started");
    let started_at = Utc::now();
    let start = Instant::now();

    let (mut report, termination, transcript) =
        match run_episode(producer, case, &EpisodeConfig::from_bench(config)) {
            Ok(outcome) => {
                let (breakdown, diagnostics) = score_doc(outcome.doc.as_ref(), case, judge);
                let report = ScoreReport {
                    case_id: case.id.clone(),
                    total: breakdown.total(),
                    breakdown,
                    steps_taken: outcome.steps_taken,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                    error: outcome.reason,
                    diagnostics,
                };
                (report, Some(outcome.termination), outcome.transcript)
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "episode errored");
                let report = ScoreReport::failure(
                    &case.id,
                    0,
                    start.elapsed().as_secs_f64(),
                    format!("episode error: {err:#}"),
                );
                (report, None, Vec::new())
            }
        };

    if let Some(base) = results_base {
        let run_id = generate_run_id();
        let input = CaptureInput {
            case,
            run_id: &run_id,
            report: &report,
            transcript: &transcript,
            termination,
            started_at,
            finished_at: Utc::now(),
        };
        match capture_run(base, &input) {
            Ok(dir) => debug!(results_dir = %dir.display(), "artifacts captured"),
            Err(err) => report
                .diagnostics
                .push(format!("capture failed: {err:#}")),
        }
    }

    info!(
        total = report.total,
        steps = report.steps_taken,
        "case run complete"
    );
    report
}

/// Run a suite of cases, optionally over parallel workers.
///
/// Cases are independent: each worker pulls the next index, runs it with its
/// own episode state, and reports back. Results keep input order, and a case
/// lost to a worker panic still yields a zero-scored entry.
#[instrument(skip_all, fields(cases = cases.len(), jobs))]
pub fn run_suite(
    cases: &[TestCase],
    producer: &dyn ActionProducer,
    judge: &dyn Judge,
    config: &BenchConfig,
    results_base: Option<&Path>,
    jobs: usize,
) -> SuiteReport {
    let start = Instant::now();
    let workers = jobs.clamp(1, cases.len().max(1));
    let next = AtomicUsize::new(0);

    let mut collected: Vec<Option<ScoreReport>> = Vec::new();
    collected.resize_with(cases.len(), || None);

    let finished = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let next = &next;
            handles.push(scope.spawn(move || {
                let mut local = Vec::new();
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(case) = cases.get(index) else {
                        break;
                    };
                    local.push((index, run_case(case, producer, judge, config, results_base)));
                }
                local
            }));
        }
        let mut finished = Vec::new();
        for handle in handles {
            if let Ok(local) = handle.join() {
                finished.extend(local);
            }
        }
        finished
    });

    for (index, report) in finished {
        collected[index] = Some(report);
    }

    let test_cases: Vec<ScoreReport> = collected
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                warn!(case_id = %cases[index].id, "case abandoned by worker");
                ScoreReport::failure(&cases[index].id, 0, 0.0, "abandoned: worker terminated".to_string())
            })
        })
        .collect();

    let overall_total: f64 = test_cases.iter().map(|report| report.total).sum();
    let average = if test_cases.is_empty() {
        0.0
    } else {
        overall_total / test_cases.len() as f64
    };

    SuiteReport {
        overall_total,
        average,
        elapsed_seconds: start.elapsed().as_secs_f64(),
        test_cases,
    }
}
