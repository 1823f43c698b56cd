//! Prompt rendering for participant turns.
//!
//! The opening task prompt carries the project metadata and the response
//! contract; tool turns wrap the tool reply in a short framing template. No
//! file contents are ever included in the opening prompt.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::io::fixture::TestCase;

const TASK_TEMPLATE: &str = include_str!("prompts/task.md");
const TOOL_RESULT_TEMPLATE: &str = include_str!("prompts/tool_result.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("task", TASK_TEMPLATE)
            .expect("task template should be valid");
        env.add_template("tool_result", TOOL_RESULT_TEMPLATE)
            .expect("tool_result template should be valid");
        Self { env }
    }

    /// Render the opening task prompt for a test case.
    pub fn render_task(&self, case: &TestCase, max_steps: u32) -> Result<String> {
        let template = self.env.get_template("task").context("get task template")?;
        let rendered = template
            .render(context! {
                name => case.metadata.name,
                description => case.metadata.description,
                language => case.metadata.language,
                domain => case.metadata.domain,
                max_steps => max_steps,
            })
            .context("render task prompt")?;
        Ok(rendered)
    }

    /// Render one tool-result turn.
    pub fn render_tool_result(&self, action: &str, body: &str) -> Result<String> {
        let template = self
            .env
            .get_template("tool_result")
            .context("get tool_result template")?;
        let rendered = template
            .render(context! {
                action => action,
                body => body,
            })
            .context("render tool result")?;
        Ok(rendered)
    }
}
