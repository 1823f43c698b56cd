//! Participant episode loop.
//!
//! Drives one participant run over a test case: task prompt out, one action
//! per turn in, tool replies appended to the accumulated context, until the
//! participant responds, the step limit is reached, or its output cannot be
//! parsed. The loop is agnostic to how actions are produced; it only needs
//! the [`ActionProducer`] interface.

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::core::protocol::{Action, GeneratedDoc, ToolReply, parse_action};
use crate::core::state::{ExplorationState, Termination, TurnRecord};
use crate::io::explore;
use crate::io::fixture::TestCase;
use crate::io::producer::{ActionProducer, TurnContext};
use crate::io::prompt::PromptEngine;

/// Loop limits, derived from [`crate::io::config::BenchConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EpisodeConfig {
    pub max_steps: u32,
    pub read_limit_bytes: usize,
}

impl EpisodeConfig {
    pub fn from_bench(config: &crate::io::config::BenchConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            read_limit_bytes: config.read_limit_bytes,
        }
    }
}

/// Result of one completed episode.
#[derive(Debug)]
pub struct EpisodeOutcome {
    pub termination: Termination,
    /// Present only when the episode reached [`Termination::Responded`].
    pub doc: Option<GeneratedDoc>,
    pub steps_taken: u32,
    /// Diagnostic reason for failed terminations.
    pub reason: Option<String>,
    pub transcript: Vec<TurnRecord>,
}

impl EpisodeOutcome {
    fn failed(
        termination: Termination,
        steps_taken: u32,
        reason: String,
        transcript: Vec<TurnRecord>,
    ) -> Self {
        Self {
            termination,
            doc: None,
            steps_taken,
            reason: Some(reason),
            transcript,
        }
    }
}

/// Run one participant episode to completion.
///
/// Producer and protocol failures terminate the episode, never the run; the
/// only errors propagated here are internal (template rendering).
#[instrument(skip_all, fields(case_id = %case.id))]
pub fn run_episode(
    producer: &dyn ActionProducer,
    case: &TestCase,
    config: &EpisodeConfig,
) -> Result<EpisodeOutcome> {
    info!(max_steps = config.max_steps, "episode started");

    let engine = PromptEngine::new();
    let mut state = ExplorationState::new();
    let mut messages = vec![engine.render_task(case, config.max_steps)?];
    let mut transcript = Vec::new();

    for step in 1..=config.max_steps {
        let turn = TurnContext {
            case_id: &case.id,
            step,
            messages: &messages,
        };
        let raw = match producer.next_action(&turn) {
            Ok(raw) => raw,
            Err(err) => {
                let reason = format!("producer failed at step {step}: {err:#}");
                warn!(step, %reason, "episode aborted");
                transcript.push(TurnRecord {
                    step,
                    action: None,
                    reply: None,
                    error: Some(reason.clone()),
                });
                return Ok(EpisodeOutcome::failed(
                    Termination::MalformedOutput,
                    step,
                    reason,
                    transcript,
                ));
            }
        };

        let action = match parse_action(&raw) {
            Ok(action) => action,
            Err(err) => {
                let reason = format!("unparseable action at step {step}: {err:#}");
                warn!(step, %reason, "episode aborted");
                transcript.push(TurnRecord {
                    step,
                    action: None,
                    reply: None,
                    error: Some(reason.clone()),
                });
                return Ok(EpisodeOutcome::failed(
                    Termination::MalformedOutput,
                    step,
                    reason,
                    transcript,
                ));
            }
        };

        match action {
            Action::Respond { readme, metadata } => {
                info!(step, "participant responded");
                transcript.push(TurnRecord {
                    step,
                    action: Some(Action::Respond {
                        readme: readme.clone(),
                        metadata: metadata.clone(),
                    }),
                    reply: None,
                    error: None,
                });
                return Ok(EpisodeOutcome {
                    termination: Termination::Responded,
                    doc: Some(GeneratedDoc { readme, metadata }),
                    steps_taken: step,
                    reason: None,
                    transcript,
                });
            }
            Action::ListDirectory { ref path } => {
                let reply = match explore::list_directory(&case.root, path) {
                    Ok(entries) => {
                        state.record(path, format!("{} entries", entries.len()));
                        ToolReply::ok(json!(entries))
                    }
                    Err(tool_err) => {
                        state.record_step();
                        ToolReply::error(tool_err.message(path))
                    }
                };
                debug!(step, path = %path, "list_directory");
                push_tool_turn(&engine, &mut messages, &mut transcript, step, &action, &reply)?;
            }
            Action::ReadFile { ref path } => {
                let reply = match explore::read_file(&case.root, path, config.read_limit_bytes) {
                    Ok(content) => {
                        state.record(path, format!("{} bytes", content.len()));
                        ToolReply::ok(json!(content))
                    }
                    Err(tool_err) => {
                        state.record_step();
                        ToolReply::error(tool_err.message(path))
                    }
                };
                debug!(step, path = %path, "read_file");
                push_tool_turn(&engine, &mut messages, &mut transcript, step, &action, &reply)?;
            }
        }
    }

    let reason = format!(
        "step limit of {} reached after exploring {} paths",
        config.max_steps,
        state.explored_count()
    );
    warn!(%reason, "episode aborted");
    Ok(EpisodeOutcome::failed(
        Termination::StepLimitExceeded,
        state.steps_taken(),
        reason,
        transcript,
    ))
}

fn push_tool_turn(
    engine: &PromptEngine,
    messages: &mut Vec<String>,
    transcript: &mut Vec<TurnRecord>,
    step: u32,
    action: &Action,
    reply: &ToolReply,
) -> Result<()> {
    let body = reply.render()?;
    messages.push(engine.render_tool_result(action.name(), &body)?);
    transcript.push(TurnRecord {
        step,
        action: Some(action.clone()),
        reply: Some(reply.result.clone()),
        error: None,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProducer, respond_action, sample_case, write_fixture};
    use tempfile::tempdir;

    fn config() -> EpisodeConfig {
        EpisodeConfig {
            max_steps: 15,
            read_limit_bytes: 64 * 1024,
        }
    }

    #[test]
    fn responds_after_exploration() {
        let temp = tempdir().expect("tempdir");
        let case = sample_case(&write_fixture(temp.path(), "word_counter"));
        let producer = ScriptedProducer::from_turns(vec![
            r#"{"action": "list_directory", "path": "."}"#.to_string(),
            r#"{"action": "read_file", "path": "wordcount.py"}"#.to_string(),
            respond_action("# word_counter\nCounts words.", true),
        ]);

        let outcome = run_episode(&producer, &case, &config()).expect("episode");
        assert_eq!(outcome.termination, Termination::Responded);
        assert_eq!(outcome.steps_taken, 3);
        assert!(outcome.doc.is_some());
        assert_eq!(outcome.transcript.len(), 3);
    }

    #[test]
    fn tool_errors_do_not_terminate_the_episode() {
        let temp = tempdir().expect("tempdir");
        let case = sample_case(&write_fixture(temp.path(), "word_counter"));
        let producer = ScriptedProducer::from_turns(vec![
            r#"{"action": "read_file", "path": "ground_truth/facts.json"}"#.to_string(),
            respond_action("# word_counter", true),
        ]);

        let outcome = run_episode(&producer, &case, &config()).expect("episode");
        assert_eq!(outcome.termination, Termination::Responded);
        let first = &outcome.transcript[0];
        assert!(first.reply.as_ref().is_some_and(|r| r["error"].is_string()));
    }

    #[test]
    fn step_limit_is_never_exceeded() {
        let temp = tempdir().expect("tempdir");
        let case = sample_case(&write_fixture(temp.path(), "word_counter"));
        let producer =
            ScriptedProducer::repeating(r#"{"action": "read_file", "path": "wordcount.py"}"#);

        let outcome = run_episode(&producer, &case, &config()).expect("episode");
        assert_eq!(outcome.termination, Termination::StepLimitExceeded);
        assert_eq!(outcome.steps_taken, 15);
        assert!(outcome.doc.is_none());
        assert!(outcome.reason.as_deref().is_some_and(|r| r.contains("step limit")));
    }

    #[test]
    fn unparseable_output_is_malformed() {
        let temp = tempdir().expect("tempdir");
        let case = sample_case(&write_fixture(temp.path(), "word_counter"));
        let producer = ScriptedProducer::from_turns(vec![
            r#"{"action": "list_directory", "path": "."}"#.to_string(),
            "I refuse to emit JSON.".to_string(),
        ]);

        let outcome = run_episode(&producer, &case, &config()).expect("episode");
        assert_eq!(outcome.termination, Termination::MalformedOutput);
        assert_eq!(outcome.steps_taken, 2);
        assert!(outcome.reason.as_deref().is_some_and(|r| r.contains("unparseable")));
    }

    #[test]
    fn producer_failure_is_malformed_with_distinct_reason() {
        let temp = tempdir().expect("tempdir");
        let case = sample_case(&write_fixture(temp.path(), "word_counter"));
        let producer = ScriptedProducer::from_turns(Vec::new());

        let outcome = run_episode(&producer, &case, &config()).expect("episode");
        assert_eq!(outcome.termination, Termination::MalformedOutput);
        assert!(outcome.reason.as_deref().is_some_and(|r| r.contains("producer failed")));
    }
}
