//! Test-only helpers for scaffolding homes and scripting agent executors.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::journal::Decision;
use crate::core::task::{Task, TaskType};
use crate::io::executor::{AgentVerdict, ExecRequest, Executor};
use crate::io::init::{HomePaths, InitOptions, init_home};
use crate::io::task_store::write_state;

/// A scaffolded `.taskline/` home in a temp directory.
pub struct TestHome {
    temp: tempfile::TempDir,
}

impl TestHome {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        init_home(temp.path(), &InitOptions { force: false })?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> HomePaths {
        HomePaths::new(self.temp.path())
    }

    /// Create a task and persist it at turn 0.
    pub fn register(&self, kind: TaskType, title: &str, description: &str) -> Result<Task> {
        let task = Task::new(kind, title, description)?;
        write_state(&self.paths().state_path, &task, 0)?;
        Ok(task)
    }
}

/// One scripted agent invocation.
pub enum ScriptedExec {
    /// Write this verdict and succeed.
    Verdict(AgentVerdict),
    /// Fail with this message without writing a verdict.
    Fail(String),
}

/// Shorthand for a successful scripted verdict.
pub fn verdict(decision: Decision, summary: &str) -> ScriptedExec {
    ScriptedExec::Verdict(AgentVerdict {
        decision,
        summary: summary.to_string(),
        artifacts: Vec::new(),
    })
}

/// Executor that replays a fixed script of agent results.
pub struct ScriptedExecutor {
    script: RefCell<VecDeque<ScriptedExec>>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<ScriptedExec>) -> Self {
        Self {
            script: RefCell::new(script.into()),
        }
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted executor exhausted"))?;
        match next {
            ScriptedExec::Verdict(scripted) => {
                if let Some(parent) = request.verdict_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut buf = serde_json::to_string(&scripted)?;
                buf.push('\n');
                fs::write(&request.verdict_path, buf)?;
                fs::write(&request.log_path, "scripted agent run\n")?;
                Ok(())
            }
            ScriptedExec::Fail(message) => Err(anyhow!(message)),
        }
    }
}
