//! Action-producer abstraction for participant turns.
//!
//! The [`ActionProducer`] trait decouples the episode loop from how actions
//! are produced (external model-backed command, heuristic, scripted). Tests
//! use scripted producers that return predetermined turns without spawning
//! processes.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::ParticipantConfig;
use crate::io::process::{command_from_argv, run_command_with_timeout};

/// Context for one participant turn: the accumulated conversation so far.
#[derive(Debug)]
pub struct TurnContext<'a> {
    pub case_id: &'a str,
    /// 1-based step number for this turn.
    pub step: u32,
    /// Task prompt followed by tool-result turns, oldest first.
    pub messages: &'a [String],
}

impl TurnContext<'_> {
    /// Render the conversation as a single prompt for stateless backends.
    pub fn render_prompt(&self) -> String {
        self.messages.join("\n\n---\n\n")
    }
}

/// Abstraction over participant backends. Implementations must be `Sync` so
/// independent cases can run on parallel workers.
pub trait ActionProducer: Sync {
    /// Produce the raw action text for one turn.
    fn next_action(&self, turn: &TurnContext<'_>) -> Result<String>;
}

/// Producer that spawns a configured external command once per turn.
///
/// The command receives the rendered conversation on stdin and must write a
/// single action JSON to stdout.
#[derive(Debug)]
pub struct CommandProducer {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandProducer {
    pub fn from_config(config: &ParticipantConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(anyhow!(
                "no participant command configured; set participant.command in the config"
            ));
        }
        Ok(Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        })
    }
}

impl ActionProducer for CommandProducer {
    #[instrument(skip_all, fields(case_id = turn.case_id, step = turn.step))]
    fn next_action(&self, turn: &TurnContext<'_>) -> Result<String> {
        info!(command = %self.command[0], "requesting participant turn");
        let cmd = command_from_argv(&self.command)?;
        let prompt = turn.render_prompt();
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .context("run participant command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "participant timed out");
            return Err(anyhow!(
                "participant command timed out after {:?}",
                self.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "participant command failed");
            return Err(anyhow!(
                "participant command failed with status {:?}: {}",
                output.status.code(),
                output.stderr.trim()
            ));
        }
        let text = output.stdout.trim().to_string();
        if text.is_empty() {
            return Err(anyhow!("participant command produced no output"));
        }
        debug!(bytes = text.len(), "participant turn received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(argv: &[&str]) -> ParticipantConfig {
        ParticipantConfig {
            command: argv.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 5,
            output_limit_bytes: 4096,
        }
    }

    fn turn(messages: &[String]) -> TurnContext<'_> {
        TurnContext {
            case_id: "word_counter",
            step: 1,
            messages,
        }
    }

    #[test]
    fn requires_a_configured_command() {
        let _err =
            CommandProducer::from_config(&ParticipantConfig::default()).expect_err("no command");
    }

    #[test]
    fn echoes_command_stdout_as_action_text() {
        let producer = CommandProducer::from_config(&config(&[
            "sh",
            "-c",
            r#"printf '{"action": "list_directory", "path": "."}'"#,
        ]))
        .expect("producer");
        let messages = vec!["task".to_string()];
        let text = producer.next_action(&turn(&messages)).expect("turn");
        assert!(text.contains("list_directory"));
    }

    #[test]
    fn conversation_reaches_command_stdin() {
        let producer = CommandProducer::from_config(&config(&["cat"])).expect("producer");
        let messages = vec!["task prompt".to_string(), "tool result".to_string()];
        let text = producer.next_action(&turn(&messages)).expect("turn");
        assert!(text.contains("task prompt"));
        assert!(text.contains("tool result"));
    }

    #[test]
    fn empty_output_is_an_error() {
        let producer = CommandProducer::from_config(&config(&["true"])).expect("producer");
        let messages = vec!["task".to_string()];
        let _err = producer.next_action(&turn(&messages)).expect_err("empty");
    }

    #[test]
    fn failing_command_is_an_error() {
        let producer =
            CommandProducer::from_config(&config(&["sh", "-c", "exit 3"])).expect("producer");
        let messages = vec!["task".to_string()];
        let err = producer.next_action(&turn(&messages)).expect_err("failure");
        assert!(err.to_string().contains("status"));
    }
}
