//! Runner settings stored at `.taskline/config.json`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::atomic::write_atomic_bytes;

/// Read-only settings view (JSON).
///
/// Constructed once at process start and passed by reference into every
/// component that needs it; there is no global cached singleton. The file is
/// intended to be edited by humans, so missing fields default to sensible
/// MVP values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Validate journal entries before appending (soft mode: warn only).
    pub validation_enabled: bool,

    /// Promote journal fsync failures from warnings to hard errors.
    pub strict_fsync: bool,

    /// Per-turn wall-clock budget in seconds (agent execution).
    pub turn_timeout_secs: u64,

    /// Truncate agent stdout/stderr logs beyond this many bytes.
    pub agent_output_limit_bytes: usize,

    /// Stop `taskline run` once this many turns have been recorded.
    pub max_turns: u64,

    /// Byte budget for the rendered prompt pack.
    pub prompt_budget_bytes: usize,

    pub agent: AgentConfig,
}

/// External coding-agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Command to execute; the prompt is fed on stdin and the last stdout
    /// line must be the verdict JSON (e.g. `["claude", "-p"]`).
    pub command: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "-p".to_string()],
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            validation_enabled: true,
            strict_fsync: false,
            turn_timeout_secs: 15 * 60,
            agent_output_limit_bytes: 100_000,
            max_turns: 50,
            prompt_budget_bytes: 40_000,
            agent: AgentConfig::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.turn_timeout_secs == 0 {
            return Err(anyhow!("turn_timeout_secs must be > 0"));
        }
        if self.agent_output_limit_bytes == 0 {
            return Err(anyhow!("agent_output_limit_bytes must be > 0"));
        }
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load settings from a JSON file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Atomically write settings to disk.
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    let mut buf = serde_json::to_string_pretty(settings).context("serialize settings")?;
    buf.push('\n');
    write_atomic_bytes(path, buf.as_bytes(), false)
        .with_context(|| format!("write settings {}", path.display()))?;
    Ok(())
}
