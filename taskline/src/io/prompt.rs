//! Prompt pack builder for deterministic agent input.
//!
//! Templates are minijinja documents carrying section markers
//! (`<!-- section:KEY required|droppable -->`). After rendering, droppable
//! sections are removed in a fixed order until the pack fits the byte
//! budget, so oversized context degrades predictably instead of failing.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::status::Step;
use crate::core::task::Task;

/// Built-in implementation prompt; overridable from `.taskline/prompts/`.
pub const IMPLEMENT_TEMPLATE: &str = include_str!("prompts/implement.md");
/// Built-in review prompt; overridable from `.taskline/prompts/`.
pub const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");

/// Task context exposed to templates.
#[derive(Debug, Clone, Serialize)]
struct TaskContext {
    id: String,
    kind: String,
    title: String,
    description: String,
    status: String,
}

impl TaskContext {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id().to_string(),
            kind: task.kind().as_str().to_string(),
            title: task.title().to_string(),
            description: task.description().to_string(),
            status: task.status().as_str().to_string(),
        }
    }
}

/// Inputs for one prompt render.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    pub task: Task,
    pub turn: u64,
    /// Summary carried over from the previous agent run, if any.
    pub history: Option<String>,
    /// Error text from the previous turn, if it failed.
    pub failure: Option<String>,
}

/// A rendered section retained in the pack.
#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

/// Rendered prompt pack after the budget pass.
#[derive(Debug, Clone)]
pub struct PromptPack {
    sections: Vec<Section>,
}

impl PromptPack {
    /// Final prompt text fed to the agent.
    pub fn render(&self) -> String {
        let parts: Vec<&str> = self.sections.iter().map(|s| s.content.as_str()).collect();
        let mut out = parts.join("\n\n");
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Section keys retained after the budget pass (render order).
    pub fn section_keys(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.key.as_str()).collect()
    }
}

/// Builds prompt packs under a byte budget.
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Render the template for `step` and apply the budget pass.
    ///
    /// When `overrides_dir` contains `implement.md` / `review.md`, that file
    /// replaces the built-in template.
    pub fn build(
        &self,
        step: Step,
        inputs: &PromptInputs,
        overrides_dir: Option<&Path>,
    ) -> Result<PromptPack> {
        let (name, builtin) = match step {
            Step::Implement => ("implement", IMPLEMENT_TEMPLATE),
            Step::Review => ("review", REVIEW_TEMPLATE),
            Step::Pick | Step::Done => {
                anyhow::bail!("no agent prompt exists for step {step}")
            }
        };

        let source = load_template_source(name, builtin, overrides_dir)?;
        let mut env = Environment::new();
        env.add_template_owned(name.to_string(), source)
            .with_context(|| format!("compile {name} template"))?;
        let template = env.get_template(name).context("lookup template")?;

        let rendered = template
            .render(context! {
                task => TaskContext::from_task(&inputs.task),
                turn => inputs.turn,
                history => inputs.history.as_deref().map(str::trim).filter(|s| !s.is_empty()),
                failure => inputs.failure.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            })
            .with_context(|| format!("render {name} template"))?;

        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        Ok(PromptPack { sections })
    }
}

fn load_template_source(
    name: &str,
    builtin: &str,
    overrides_dir: Option<&Path>,
) -> Result<String> {
    if let Some(dir) = overrides_dir {
        let candidate = dir.join(format!("{name}.md"));
        if candidate.exists() {
            return fs::read_to_string(&candidate)
                .with_context(|| format!("read prompt override {}", candidate.display()));
        }
    }
    Ok(builtin.to_string())
}

/// Parse sections from rendered template output using comment markers.
fn parse_sections(rendered: &str) -> Vec<Section> {
    static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
            .expect("section marker pattern")
    });

    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
        let required = caps.get(2).map(|m| m.as_str()) == Some("required");
        let start = caps.get(0).map(|m| m.end()).unwrap_or_default();
        let end = matches
            .get(i + 1)
            .and_then(|m| m.get(0))
            .map_or(rendered.len(), |m| m.start());

        let content = rendered[start..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(Section {
                key,
                required,
                content,
            });
        }
    }

    sections
}

/// Drop droppable sections in a fixed order until the pack fits the budget.
fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    let total = |secs: &[Section]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total(sections) <= budget {
        return;
    }

    for key in ["history", "failure"] {
        if total(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropping prompt section to fit budget"
            );
            sections.remove(idx);
        }
    }
}
