//! Wire protocol between the participant and the episode loop.
//!
//! One JSON action per turn in, one JSON tool reply per turn out. Participant
//! output is extracted leniently (tag blocks, code fences, brace spans) before
//! parsing, since model-backed participants tend to wrap JSON in prose.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One participant action per turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// List entries at a path relative to the case root.
    ListDirectory {
        #[serde(default = "default_list_path")]
        path: String,
    },
    /// Read a file relative to the case root.
    ReadFile { path: String },
    /// Submit the final documentation. Terminates the episode.
    Respond {
        readme: String,
        #[serde(default)]
        metadata: Value,
    },
}

fn default_list_path() -> String {
    ".".to_string()
}

impl Action {
    /// Protocol name of the action, as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Action::ListDirectory { .. } => "list_directory",
            Action::ReadFile { .. } => "read_file",
            Action::Respond { .. } => "respond",
        }
    }
}

/// The final documentation pair submitted by a `respond` action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedDoc {
    pub readme: String,
    pub metadata: Value,
}

/// Tool reply sent back to the participant: `{"result": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolReply {
    pub result: Value,
}

impl ToolReply {
    pub fn ok(result: Value) -> Self {
        Self { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: serde_json::json!({ "error": message.into() }),
        }
    }

    /// Render the reply as the JSON body embedded in the next turn's message.
    pub fn render(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize tool reply")
    }
}

/// Extract the JSON payload from raw participant text.
///
/// Tries, in order: a `<json>...</json>` tag block, a fenced code block, the
/// outermost brace span. Returns the text unchanged if none match.
pub fn extract_json(text: &str) -> &str {
    static TAG_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"(?s)<json>(.*?)</json>").unwrap());
    static FENCE_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

    if let Some(caps) = TAG_RE.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim()).unwrap_or(text);
    }
    if let Some(caps) = FENCE_RE.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim()).unwrap_or(text);
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
    {
        return &text[start..=end];
    }
    text.trim()
}

/// Parse one turn of participant output into an [`Action`].
///
/// Anything that fails here is a protocol violation: the episode terminates
/// in the malformed-output state with the error chain as the reason.
pub fn parse_action(text: &str) -> Result<Action> {
    let payload = extract_json(text);
    if payload.is_empty() {
        bail!("empty participant output");
    }
    let value: Value = serde_json::from_str(payload).context("parse action json")?;
    let action: Action = serde_json::from_value(value).context("unrecognized action shape")?;
    Ok(action)
}
