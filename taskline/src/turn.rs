//! Orchestration for a single workflow turn.
//!
//! A turn inspects the task's current status, runs the step it projects to
//! (pick and restart turns are pure transitions; implement and review turns
//! invoke the agent), then persists the snapshot, appends one journal
//! record, and refreshes the health file. Errors from the agent mark the
//! task FAILED; the next turn restarts the workflow from PENDING.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::{debug, info};

use crate::core::journal::{Decision, JournalEntry};
use crate::core::status::{Status, Step};
use crate::core::task::Task;
use crate::io::config::{Settings, load_settings};
use crate::io::executor::{AgentVerdict, ExecRequest, Executor, execute_and_load};
use crate::io::health::write_health;
use crate::io::init::HomePaths;
use crate::io::journal::JournalWriter;
use crate::io::prompt::{PromptBuilder, PromptInputs};
use crate::io::task_store::{load_state, write_state};

/// Result of a single turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Turn number recorded in the journal (1-indexed).
    pub turn: u64,
    /// Task the turn operated on.
    pub task_id: String,
    /// Step the turn executed.
    pub step: Step,
    /// Status after the turn.
    pub status: Status,
    /// Decision recorded in the journal.
    pub decision: String,
    /// Error text, empty when the turn succeeded.
    pub error: String,
    /// True once the task reached DONE.
    pub complete: bool,
}

/// Execute one turn of the workflow.
///
/// No-ops (without touching any file) when the task is already DONE.
pub fn run_turn<E: Executor>(root: &Path, executor: &E) -> Result<TurnOutcome> {
    let started = Instant::now();
    let paths = HomePaths::new(root);
    let settings = load_settings(&paths.config_path)?;
    let (mut task, last_turn) = load_state(&paths.state_path)
        .context("load task state (run `taskline register` first)")?;

    if task.status() == Status::Done {
        debug!(task_id = %task.id(), "task already complete");
        return Ok(TurnOutcome {
            turn: last_turn,
            task_id: task.id().to_string(),
            step: Step::Done,
            status: Status::Done,
            decision: Decision::Ok.as_str().to_string(),
            error: String::new(),
            complete: true,
        });
    }

    let turn = last_turn + 1;
    let deadline = started + Duration::from_secs(settings.turn_timeout_secs);

    // The step label records what this turn actually ran: a PICKED turn
    // executes the implement agent, and a FAILED restart re-enters pick.
    let step: Step;
    let mut decision = Decision::Pending;
    let mut error_text = String::new();
    let mut artifacts: Vec<String> = Vec::new();

    match task.status() {
        Status::Pending => {
            step = Step::Pick;
            info!(task_id = %task.id(), "picking task");
            task.update_status(Status::Picked)?;
        }
        Status::Failed => {
            step = Step::Pick;
            info!(task_id = %task.id(), "restarting failed task");
            task.update_status(Status::Pending)?;
        }
        Status::Picked | Status::Implementing => {
            step = Step::Implement;
            if task.status() == Status::Picked {
                task.update_status(Status::Implementing)?;
                // Persist entering the working state so a crash mid-agent
                // leaves a resumable IMPLEMENTING snapshot.
                write_state(&paths.state_path, &task, last_turn)?;
            }
            match run_agent(
                executor,
                Step::Implement,
                &paths,
                &settings,
                &task,
                turn,
                deadline,
                &mut artifacts,
            ) {
                Ok(verdict) => {
                    info!(summary = %verdict.summary, "implementation finished");
                    task.update_status(Status::Reviewing)?;
                }
                Err(err) => {
                    error_text = format!("{err:#}");
                    task.update_status(Status::Failed)?;
                }
            }
        }
        Status::Reviewing => {
            step = Step::Review;
            match run_agent(
                executor,
                Step::Review,
                &paths,
                &settings,
                &task,
                turn,
                deadline,
                &mut artifacts,
            ) {
                Ok(verdict) => {
                    decision = verdict.decision;
                    match verdict.decision {
                        Decision::Ok => {
                            info!(task_id = %task.id(), "review accepted; task done");
                            task.update_status(Status::Done)?;
                        }
                        // Anything short of acceptance sends the task back.
                        Decision::NeedsChanges | Decision::Pending => {
                            info!(summary = %verdict.summary, "review requested changes");
                            task.update_status(Status::Implementing)?;
                        }
                    }
                }
                Err(err) => {
                    error_text = format!("{err:#}");
                    task.update_status(Status::Failed)?;
                }
            }
        }
        Status::Done => unreachable!("handled above"),
    }

    write_state(&paths.state_path, &task, turn)?;

    let writer = JournalWriter::new(&paths.journal_path)
        .with_validation(settings.validation_enabled)
        .with_strict_fsync(settings.strict_fsync);
    writer.append(&json!({
        "turn": turn,
        "step": step.as_str(),
        "decision": decision.as_str(),
        "elapsed_ms": started.elapsed().as_millis() as i64,
        "error": error_text,
        "artifacts": artifacts,
    }))?;

    write_health(
        &paths.health_path,
        turn,
        step.as_str(),
        error_text.is_empty(),
        &error_text,
    )?;

    Ok(TurnOutcome {
        turn,
        task_id: task.id().to_string(),
        step,
        status: task.status(),
        decision: decision.as_str().to_string(),
        error: error_text,
        complete: task.status() == Status::Done,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_agent<E: Executor>(
    executor: &E,
    step: Step,
    paths: &HomePaths,
    settings: &Settings,
    task: &Task,
    turn: u64,
    deadline: Instant,
    artifacts: &mut Vec<String>,
) -> Result<AgentVerdict> {
    let timeout = remaining_budget(deadline)?;

    let inputs = PromptInputs {
        task: task.clone(),
        turn,
        history: previous_verdict_summary(paths, turn),
        failure: previous_failure(paths),
    };
    let pack = PromptBuilder::new(settings.prompt_budget_bytes).build(
        step,
        &inputs,
        Some(&paths.prompts_dir),
    )?;

    let turn_dir = paths.turn_dir(turn);
    fs::create_dir_all(&turn_dir)
        .with_context(|| format!("create turn dir {}", turn_dir.display()))?;

    let request = ExecRequest {
        workdir: paths.root.clone(),
        prompt: pack.render(),
        verdict_path: turn_dir.join("verdict.json"),
        log_path: turn_dir.join("agent.log"),
        timeout,
        output_limit_bytes: settings.agent_output_limit_bytes,
    };

    artifacts.push(format!(".taskline/var/turns/{turn}/agent.log"));
    artifacts.push(format!(".taskline/var/turns/{turn}/verdict.json"));

    let verdict = execute_and_load(executor, &request)?;
    artifacts.extend(verdict.artifacts.iter().cloned());
    Ok(verdict)
}

fn remaining_budget(deadline: Instant) -> Result<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::ZERO);
    if remaining.is_zero() {
        return Err(anyhow!("turn timed out"));
    }
    Ok(remaining)
}

/// Summary from the previous turn's verdict, used as prompt history.
fn previous_verdict_summary(paths: &HomePaths, turn: u64) -> Option<String> {
    if turn < 2 {
        return None;
    }
    let path = paths.turn_dir(turn - 1).join("verdict.json");
    let contents = fs::read_to_string(path).ok()?;
    let verdict: AgentVerdict = serde_json::from_str(&contents).ok()?;
    let summary = verdict.summary.trim();
    (!summary.is_empty()).then(|| summary.to_string())
}

/// Error from the most recent journal record, used as prompt failure context.
fn previous_failure(paths: &HomePaths) -> Option<String> {
    let contents = fs::read_to_string(&paths.journal_path).ok()?;
    let last = contents.lines().rev().find(|line| !line.trim().is_empty())?;
    let entry: JournalEntry = serde_json::from_str(last).ok()?;
    (!entry.error.is_empty()).then(|| entry.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::TaskType;
    use crate::io::health::read_health;
    use crate::test_support::{ScriptedExec, ScriptedExecutor, TestHome, verdict};

    fn read_journal(paths: &HomePaths) -> Vec<JournalEntry> {
        std::fs::read_to_string(&paths.journal_path)
            .expect("read journal")
            .lines()
            .map(|line| serde_json::from_str(line).expect("parse journal line"))
            .collect()
    }

    #[test]
    fn pick_turn_transitions_without_agent() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(Vec::new());

        let outcome = run_turn(home.root(), &executor).expect("turn");

        assert_eq!(outcome.turn, 1);
        assert_eq!(outcome.step, Step::Pick);
        assert_eq!(outcome.status, Status::Picked);
        assert_eq!(outcome.decision, "PENDING");
        assert!(!outcome.complete);

        let paths = home.paths();
        let (task, turn) = load_state(&paths.state_path).expect("state");
        assert_eq!(turn, 1);
        assert_eq!(task.status(), Status::Picked);

        let journal = read_journal(&paths);
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].step, "PICK");
        assert!(journal[0].error.is_empty());

        let health = read_health(&paths.health_path).expect("health");
        assert!(health.ok);
        assert_eq!(health.turn, 1);
    }

    #[test]
    fn implement_success_moves_to_reviewing() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![verdict(Decision::Pending, "implemented login")]);

        run_turn(home.root(), &executor).expect("pick");
        let outcome = run_turn(home.root(), &executor).expect("implement");

        assert_eq!(outcome.step, Step::Implement);
        assert_eq!(outcome.status, Status::Reviewing);

        let paths = home.paths();
        let journal = read_journal(&paths);
        assert_eq!(journal.len(), 2);
        assert!(
            journal[1]
                .artifacts
                .contains(&".taskline/var/turns/2/agent.log".to_string())
        );
    }

    #[test]
    fn review_ok_completes_the_task() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![
            verdict(Decision::Pending, "implemented login"),
            verdict(Decision::Ok, "looks correct"),
        ]);

        run_turn(home.root(), &executor).expect("pick");
        run_turn(home.root(), &executor).expect("implement");
        let outcome = run_turn(home.root(), &executor).expect("review");

        assert_eq!(outcome.step, Step::Review);
        assert_eq!(outcome.status, Status::Done);
        assert_eq!(outcome.decision, "OK");
        assert!(outcome.complete);

        let paths = home.paths();
        let journal = read_journal(&paths);
        assert_eq!(journal.len(), 3);
        assert_eq!(journal[2].decision, "OK");
    }

    #[test]
    fn review_needs_changes_reenters_implementation() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![
            verdict(Decision::Pending, "implemented login"),
            verdict(Decision::NeedsChanges, "missing error handling"),
        ]);

        run_turn(home.root(), &executor).expect("pick");
        run_turn(home.root(), &executor).expect("implement");
        let outcome = run_turn(home.root(), &executor).expect("review");

        assert_eq!(outcome.status, Status::Implementing);
        assert_eq!(outcome.decision, "NEEDS_CHANGES");
        assert!(!outcome.complete);
    }

    #[test]
    fn agent_failure_marks_task_failed_then_restarts() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![ScriptedExec::Fail("agent crashed".to_string())]);

        run_turn(home.root(), &executor).expect("pick");
        let failed = run_turn(home.root(), &executor).expect("implement attempt");

        assert_eq!(failed.status, Status::Failed);
        assert!(failed.error.contains("agent crashed"));

        let paths = home.paths();
        let health = read_health(&paths.health_path).expect("health");
        assert!(!health.ok);
        assert!(health.error.contains("agent crashed"));

        // Restart turn: FAILED -> PENDING, no agent involved.
        let restarted = run_turn(home.root(), &executor).expect("restart");
        assert_eq!(restarted.status, Status::Pending);
        assert_eq!(restarted.step, Step::Pick, "restart re-enters pick");
        assert!(restarted.error.is_empty());
    }

    #[test]
    fn done_task_is_a_no_op() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![
            verdict(Decision::Pending, "implemented"),
            verdict(Decision::Ok, "accepted"),
        ]);

        run_turn(home.root(), &executor).expect("pick");
        run_turn(home.root(), &executor).expect("implement");
        run_turn(home.root(), &executor).expect("review");

        let paths = home.paths();
        let lines_before = read_journal(&paths).len();
        let outcome = run_turn(home.root(), &executor).expect("idle turn");

        assert!(outcome.complete);
        assert_eq!(read_journal(&paths).len(), lines_before, "no journal growth");
    }

    /// The review prompt receives the implementation summary as history.
    #[test]
    fn review_prompt_sees_previous_summary() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![verdict(Decision::Pending, "wired up the form")]);

        run_turn(home.root(), &executor).expect("pick");
        run_turn(home.root(), &executor).expect("implement");

        let paths = home.paths();
        let summary = previous_verdict_summary(&paths, 3);
        assert_eq!(summary, Some("wired up the form".to_string()));
    }
}
