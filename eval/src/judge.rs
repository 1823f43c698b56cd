//! Judge seam for the LLM-scored tiers.
//!
//! The [`Judge`] trait decouples the scorer from the external reasoning
//! collaborator. `CommandJudge` spawns a configured command per sub-criterion;
//! `HeuristicJudge` is a deterministic offline fallback used when no command
//! is configured, by rubric calibration, and by tests.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use harness::core::protocol::extract_json;
use harness::io::config::JudgeConfig;
use harness::io::process::{command_from_argv, run_command_with_timeout};

/// A judged sub-criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Purpose,
    Dependencies,
    RunCommand,
    Clarity,
    Completeness,
    Formatting,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Purpose => "purpose",
            Criterion::Dependencies => "dependencies",
            Criterion::RunCommand => "run_command",
            Criterion::Clarity => "clarity",
            Criterion::Completeness => "completeness",
            Criterion::Formatting => "formatting",
        }
    }
}

/// One judging request: a criterion, the reference answer (empty for quality
/// criteria), and the readme under evaluation.
#[derive(Debug)]
pub struct JudgeRequest<'a> {
    pub criterion: Criterion,
    pub reference: String,
    pub readme: &'a str,
    pub max_points: f64,
}

/// Abstraction over judge backends. Implementations must be `Sync` so
/// independent cases can be judged on parallel workers.
pub trait Judge: Sync {
    /// Return a continuous sub-score in `[0, max_points]`. Any error degrades
    /// the sub-score to 0 at the scoring layer; it never aborts the run.
    fn assess(&self, request: &JudgeRequest<'_>) -> Result<f64>;
}

/// Judge that spawns a configured external reasoning command.
#[derive(Debug)]
pub struct CommandJudge {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    temperature: f64,
}

impl CommandJudge {
    pub fn from_config(config: &JudgeConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(anyhow!("no judge command configured"));
        }
        Ok(Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            temperature: config.temperature,
        })
    }

    fn build_prompt(&self, request: &JudgeRequest<'_>) -> String {
        format!(
            "You are a documentation quality evaluator.\n\n\
             CRITERION: {criterion}\n\
             QUESTION: {question}\n\n\
             README UNDER EVALUATION:\n{readme}\n\n\
             Respond with JSON only: {{\"score\": <number between 0 and {max}>}}\n",
            criterion = request.criterion.as_str(),
            question = question_for(request),
            readme = request.readme,
            max = request.max_points,
        )
    }
}

impl Judge for CommandJudge {
    #[instrument(skip_all, fields(criterion = request.criterion.as_str()))]
    fn assess(&self, request: &JudgeRequest<'_>) -> Result<f64> {
        let mut cmd = command_from_argv(&self.command)?;
        cmd.env("BENCH_JUDGE_TEMPERATURE", self.temperature.to_string());
        let prompt = self.build_prompt(request);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .context("run judge command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "judge timed out");
            return Err(anyhow!("judge command timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "judge command failed with status {:?}: {}",
                output.status.code(),
                output.stderr.trim()
            ));
        }

        let payload = extract_json(&output.stdout);
        let value: Value = serde_json::from_str(payload).context("parse judge response")?;
        let score = value
            .get("score")
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow!("judge response missing numeric score"))?;
        debug!(score, "judge responded");
        Ok(score)
    }
}

fn question_for(request: &JudgeRequest<'_>) -> String {
    match request.criterion {
        Criterion::Purpose => format!(
            "Does the README's stated purpose match this reference purpose: \"{}\"?",
            request.reference
        ),
        Criterion::Dependencies => {
            if request.reference.trim().is_empty() {
                "Does the README correctly state that the project has no third-party \
                 dependencies (standard library only)?"
                    .to_string()
            } else {
                format!(
                    "Does the README correctly list these dependencies: {}?",
                    request.reference
                )
            }
        }
        Criterion::RunCommand => format!(
            "Does the README document an invocation semantically matching \"{}\"? \
             An exact string match is not required.",
            request.reference
        ),
        Criterion::Clarity => {
            "Is the README easy to understand and well-structured?".to_string()
        }
        Criterion::Completeness => {
            "Does the README cover everything a new user needs (features, install, usage, examples)?"
                .to_string()
        }
        Criterion::Formatting => {
            "Is the README professionally formatted (headings, lists, code blocks)?".to_string()
        }
    }
}

/// Deterministic judge built from keyword overlap and structural signals.
///
/// Not a substitute for a reasoning collaborator, but calibrated well enough
/// to keep the rubric self-test and the test suite offline and reproducible.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicJudge;

const NO_DEPENDENCY_MARKERS: [&str; 4] = [
    "no dependencies",
    "no third-party",
    "standard library",
    "stdlib",
];
const COMPLETENESS_MARKERS: [&str; 5] = ["install", "usage", "example", "feature", "license"];

impl Judge for HeuristicJudge {
    fn assess(&self, request: &JudgeRequest<'_>) -> Result<f64> {
        let readme_lower = request.readme.to_lowercase();
        let max = request.max_points;
        let score = match request.criterion {
            Criterion::Purpose => {
                let reference = word_tokens(&request.reference);
                if reference.is_empty() {
                    0.0
                } else {
                    let readme = word_tokens(request.readme);
                    let hits = reference.intersection(&readme).count();
                    max * hits as f64 / reference.len() as f64
                }
            }
            Criterion::Dependencies => {
                if request.reference.trim().is_empty() {
                    if NO_DEPENDENCY_MARKERS
                        .iter()
                        .any(|marker| readme_lower.contains(marker))
                    {
                        max
                    } else {
                        0.0
                    }
                } else {
                    let deps: Vec<&str> = request
                        .reference
                        .split(", ")
                        .filter(|dep| !dep.is_empty())
                        .collect();
                    let hits = deps
                        .iter()
                        .filter(|dep| readme_lower.contains(&dep.to_lowercase()))
                        .count();
                    max * hits as f64 / deps.len() as f64
                }
            }
            Criterion::RunCommand => {
                let reference = request.reference.to_lowercase();
                if readme_lower.contains(reference.trim()) {
                    max
                } else {
                    let tokens: Vec<&str> = reference.split_whitespace().collect();
                    if tokens.is_empty() {
                        0.0
                    } else {
                        let hits = tokens
                            .iter()
                            .filter(|token| readme_lower.contains(*token))
                            .count();
                        max * hits as f64 / tokens.len() as f64
                    }
                }
            }
            Criterion::Clarity => {
                let mut signals = 0;
                if request.readme.lines().any(|line| line.starts_with('#')) {
                    signals += 1;
                }
                if request.readme.contains("\n\n") {
                    signals += 1;
                }
                if average_line_length(request.readme) <= 120.0 {
                    signals += 1;
                }
                max * signals as f64 / 3.0
            }
            Criterion::Completeness => {
                let hits = COMPLETENESS_MARKERS
                    .iter()
                    .filter(|marker| readme_lower.contains(*marker))
                    .count();
                max * hits as f64 / COMPLETENESS_MARKERS.len() as f64
            }
            Criterion::Formatting => {
                let mut score = 0.0;
                if request.readme.contains("```") {
                    score += 3.0 / 8.0 * max;
                }
                if request
                    .readme
                    .lines()
                    .any(|line| line.starts_with("- ") || line.starts_with("* "))
                {
                    score += 3.0 / 8.0 * max;
                }
                if request.readme.lines().any(|line| line.starts_with('#')) {
                    score += 2.0 / 8.0 * max;
                }
                score
            }
        };
        Ok(score.clamp(0.0, max))
    }
}

fn word_tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| word.len() >= 4)
        .map(str::to_string)
        .collect()
}

fn average_line_length(text: &str) -> f64 {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.is_empty() {
        return 0.0;
    }
    lines.iter().map(|line| line.len()).sum::<usize>() as f64 / lines.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(criterion: Criterion, reference: &str, readme: &str, max: f64) -> f64 {
        HeuristicJudge
            .assess(&JudgeRequest {
                criterion,
                reference: reference.to_string(),
                readme,
                max_points: max,
            })
            .expect("heuristic judge never fails")
    }

    #[test]
    fn purpose_overlap_is_proportional() {
        let reference = "Count word frequencies in text files";
        let full = request(Criterion::Purpose, reference, reference, 12.0);
        assert_eq!(full, 12.0);

        let none = request(Criterion::Purpose, reference, "A calendar widget.", 12.0);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn empty_dependency_list_wants_stdlib_statement() {
        let stated = request(
            Criterion::Dependencies,
            "",
            "Uses the standard library only.",
            10.0,
        );
        assert_eq!(stated, 10.0);

        let silent = request(Criterion::Dependencies, "", "Depends on numpy.", 10.0);
        assert_eq!(silent, 0.0);
    }

    #[test]
    fn listed_dependencies_score_fractionally() {
        let score = request(
            Criterion::Dependencies,
            "requests, click",
            "Install requests before running.",
            10.0,
        );
        assert_eq!(score, 5.0);
    }

    #[test]
    fn exact_run_command_scores_full() {
        let score = request(
            Criterion::RunCommand,
            "python wordcount.py input.txt",
            "Run `python wordcount.py input.txt` to start.",
            8.0,
        );
        assert_eq!(score, 8.0);
    }

    #[test]
    fn quality_criteria_reward_structure() {
        let structured = "# Title\n\nIntro paragraph.\n\n- item\n\n```\ncode\n```\n";
        assert_eq!(request(Criterion::Clarity, "", structured, 12.0), 12.0);
        assert_eq!(request(Criterion::Formatting, "", structured, 8.0), 8.0);

        let flat = "one line of prose";
        assert_eq!(request(Criterion::Clarity, "", flat, 12.0), 4.0);
        assert_eq!(request(Criterion::Formatting, "", flat, 8.0), 0.0);
    }

    #[test]
    fn command_judge_requires_configured_command() {
        let _err = CommandJudge::from_config(&JudgeConfig::default()).expect_err("no command");
    }

    #[test]
    fn command_judge_parses_score_from_stdout() {
        let config = JudgeConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"printf '{"score": 7.5}'"#.to_string(),
            ],
            ..JudgeConfig::default()
        };
        let judge = CommandJudge::from_config(&config).expect("judge");
        let score = judge
            .assess(&JudgeRequest {
                criterion: Criterion::Purpose,
                reference: "anything".to_string(),
                readme: "anything",
                max_points: 12.0,
            })
            .expect("assess");
        assert_eq!(score, 7.5);
    }

    #[test]
    fn command_judge_rejects_garbage_response() {
        let config = JudgeConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "printf 'not a score'".to_string(),
            ],
            ..JudgeConfig::default()
        };
        let judge = CommandJudge::from_config(&config).expect("judge");
        let _err = judge
            .assess(&JudgeRequest {
                criterion: Criterion::Clarity,
                reference: String::new(),
                readme: "anything",
                max_points: 12.0,
            })
            .expect_err("garbage");
    }
}
