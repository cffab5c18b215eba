//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples turn orchestration from the actual
//! agent backend. Tests use scripted executors that return predetermined
//! verdicts without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::journal::Decision;
use crate::io::process::run_with_timeout;

const VERDICT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/agent_verdict/v1.schema.json"
));

/// Structured output the agent must produce for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVerdict {
    pub decision: Decision,
    pub summary: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// Parameters for one executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Prompt text to feed to the agent on stdin.
    pub prompt: String,
    /// Path where the verdict JSON is stored for audit.
    pub verdict_path: PathBuf,
    /// Path to write the agent stdout/stderr log.
    pub log_path: PathBuf,
    /// Maximum time to wait for the agent to complete.
    pub timeout: Duration,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over agent execution backends.
pub trait Executor {
    /// Run the agent. Must leave the verdict JSON at `request.verdict_path`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

/// Executor that spawns the configured agent CLI.
///
/// The prompt goes to stdin; the last non-empty stdout line must be the
/// verdict JSON object, which is copied to `verdict_path`.
pub struct AgentCliExecutor {
    command: Vec<String>,
}

impl AgentCliExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Executor for AgentCliExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        info!(program = %program, workdir = %request.workdir.display(), "starting agent");

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]).current_dir(&request.workdir);

        let output = run_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run agent '{program}'"))?;

        write_agent_log(&request.log_path, &output)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "agent timed out");
            return Err(anyhow!("agent timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent failed");
            return Err(anyhow!(
                "agent '{program}' failed with status {:?}",
                output.status.code()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let verdict_line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| anyhow!("agent produced no output (expected verdict JSON)"))?;

        if let Some(parent) = request.verdict_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create verdict dir {}", parent.display()))?;
        }
        fs::write(&request.verdict_path, format!("{}\n", verdict_line.trim()))
            .with_context(|| format!("write verdict {}", request.verdict_path.display()))?;

        debug!("agent completed");
        Ok(())
    }
}

/// Execute the agent and load its schema-validated verdict.
pub fn execute_and_load<E: Executor>(executor: &E, request: &ExecRequest) -> Result<AgentVerdict> {
    executor.exec(request)?;
    if !request.verdict_path.exists() {
        return Err(anyhow!(
            "missing agent verdict {}",
            request.verdict_path.display()
        ));
    }
    let contents = fs::read_to_string(&request.verdict_path)
        .with_context(|| format!("read verdict {}", request.verdict_path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse verdict {}", request.verdict_path.display()))?;
    validate_verdict_schema(&value)?;
    let verdict: AgentVerdict = serde_json::from_value(value)
        .with_context(|| format!("deserialize verdict {}", request.verdict_path.display()))?;
    debug!(decision = %verdict.decision, "parsed agent verdict");
    Ok(verdict)
}

fn validate_verdict_schema(value: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(VERDICT_SCHEMA).context("parse embedded verdict schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid verdict schema: {err}"))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "verdict schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_agent_log(path: &Path, output: &crate::io::process::CapturedOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create agent log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.truncation_notice());
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write agent log {}", path.display()))
}
