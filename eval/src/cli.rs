//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use harness::io::config::{BenchConfig, load_config};
use harness::io::fixture::{TestCase, discover_cases, select_cases};
use harness::io::producer::CommandProducer;

use crate::judge::{CommandJudge, HeuristicJudge, Judge};
use crate::report::aggregate;
use crate::results::{generate_run_id, write_json};
use crate::rubric::validate_rubric;
use crate::run::run_suite;

/// List all available cases.
pub fn list_cases(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let cases = discover_cases(&config.fixtures_dir)?;
    for case in cases {
        println!("{}", case.id);
    }
    Ok(())
}

/// Run selected cases (or all) and print the run report.
pub fn run_cases(
    config_path: &Path,
    case_ids: &[String],
    all: bool,
    runs: u32,
    jobs: usize,
) -> Result<()> {
    if runs == 0 {
        bail!("--runs must be > 0");
    }
    let config = load_config(config_path)?;
    let cases = load_selection(&config, case_ids, all)?;
    let producer = CommandProducer::from_config(&config.participant)
        .context("configure participant")?;
    let judge = build_judge(&config)?;
    debug!(cases = cases.len(), runs, jobs, "selection loaded");

    let mut scheduled = Vec::with_capacity(cases.len() * runs as usize);
    for _ in 0..runs {
        scheduled.extend(cases.iter().cloned());
    }

    info!(scheduled = scheduled.len(), "starting runs");
    let suite = run_suite(
        &scheduled,
        &producer,
        judge.as_ref(),
        &config,
        Some(&config.results_dir),
        jobs,
    );

    for report in &suite.test_cases {
        let note = report
            .error
            .as_deref()
            .map(|reason| format!(" ({reason})"))
            .unwrap_or_default();
        println!(
            "run: case={} total={:.1}/100 steps={}{}",
            report.case_id, report.total, report.steps_taken, note
        );
    }
    println!(
        "run: overall_total={:.1} average={:.1}% elapsed={:.1}s cases={}",
        suite.overall_total,
        suite.average,
        suite.elapsed_seconds,
        suite.test_cases.len()
    );

    let report_path = config
        .results_dir
        .join("runs")
        .join(format!("{}.json", generate_run_id()));
    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    write_json(&report_path, &suite).context("write run report")?;
    println!("run: report={}", report_path.display());
    Ok(())
}

/// Show aggregated results for a case.
pub fn report_case(config_path: &Path, case_id: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let results_dir = config.results_dir.join(case_id);
    let (summary, warnings) = aggregate(&results_dir)?;
    println!("report: case={} runs={}", case_id, summary.runs);
    println!(
        "report: responded={} step_limit={} malformed={} errors={}",
        summary.responded, summary.step_limit, summary.malformed, summary.errors
    );
    if let Some(avg) = summary.avg_total {
        println!("report: avg_total={:.1}/100", avg);
    }
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={:.2}", avg);
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

/// Run the rubric calibration self-test.
pub fn validate_rubric_cmd(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let judge = build_judge(&config)?;
    let outcomes = validate_rubric(judge.as_ref())?;

    let mut failed = 0;
    for outcome in &outcomes {
        let status = if outcome.passed { "pass" } else { "FAIL" };
        println!(
            "rubric: {} {} total={:.1} expected=[{:.0}, {:.0}] tiers={:.1}/{:.1}/{:.1}/{:.1}",
            status,
            outcome.fixture,
            outcome.total,
            outcome.expected_low,
            outcome.expected_high,
            outcome.breakdown.tier1,
            outcome.breakdown.tier2,
            outcome.breakdown.tier3,
            outcome.breakdown.tier4,
        );
        if !outcome.passed {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} calibration range(s) failed");
    }
    Ok(())
}

/// Remove persisted results for a case.
pub fn clean_case(config_path: &Path, case_id: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let case_results = config.results_dir.join(case_id);
    if case_results.exists() {
        std::fs::remove_dir_all(&case_results)
            .with_context(|| format!("remove {}", case_results.display()))?;
    }
    println!("clean: case={} results={}", case_id, case_results.display());
    Ok(())
}

fn load_selection(
    config: &BenchConfig,
    case_ids: &[String],
    all: bool,
) -> Result<Vec<TestCase>> {
    let cases = discover_cases(&config.fixtures_dir)?;
    if cases.is_empty() {
        bail!(
            "no fixtures found under {}",
            config.fixtures_dir.display()
        );
    }
    if all || case_ids.is_empty() {
        return Ok(cases);
    }
    select_cases(cases, case_ids)
}

fn build_judge(config: &BenchConfig) -> Result<Box<dyn Judge>> {
    if config.judge.command.is_empty() {
        debug!("no judge command configured, using heuristic judge");
        Ok(Box::new(HeuristicJudge))
    } else {
        Ok(Box::new(CommandJudge::from_config(&config.judge)?))
    }
}
