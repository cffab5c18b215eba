//! Multi-turn driver loop for `taskline run`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::status::Status;
use crate::io::config::load_settings;
use crate::io::executor::Executor;
use crate::io::init::HomePaths;
use crate::io::task_store::load_state;
use crate::turn::{TurnOutcome, run_turn};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The task reached DONE.
    Complete,
    /// The configured `max_turns` budget is exhausted.
    MaxTurnsExceeded { next_turn: u64, max_turns: u64 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub task_id: String,
    pub turns_executed: u64,
    pub stop: LoopStop,
}

/// Run turns until the task completes or the turn budget runs out.
///
/// Stops immediately on any hard error (state load, schema violation,
/// journal append under strict fsync, health write). Agent failures are not
/// hard errors: they mark the task FAILED and the loop keeps going, bounded
/// by `max_turns`.
pub fn run_loop<E: Executor, F: FnMut(&TurnOutcome)>(
    root: &Path,
    executor: &E,
    mut on_turn: F,
) -> Result<LoopOutcome> {
    let paths = HomePaths::new(root);
    let settings = load_settings(&paths.config_path)?;

    let mut turns_executed = 0u64;
    loop {
        // Pre-check without the heavier setup run_turn performs; agent
        // execution dominates runtime, so the extra state load is noise.
        let (task, turn) = load_state(&paths.state_path)
            .with_context(|| format!("load {}", paths.state_path.display()))?;
        if task.status() == Status::Done {
            return Ok(LoopOutcome {
                task_id: task.id().to_string(),
                turns_executed,
                stop: LoopStop::Complete,
            });
        }
        if turn >= settings.max_turns {
            return Ok(LoopOutcome {
                task_id: task.id().to_string(),
                turns_executed,
                stop: LoopStop::MaxTurnsExceeded {
                    next_turn: turn + 1,
                    max_turns: settings.max_turns,
                },
            });
        }

        let outcome = run_turn(root, executor)?;
        turns_executed += 1;
        on_turn(&outcome);
        if outcome.complete {
            return Ok(LoopOutcome {
                task_id: outcome.task_id,
                turns_executed,
                stop: LoopStop::Complete,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::journal::Decision;
    use crate::core::task::TaskType;
    use crate::io::config::{Settings, write_settings};
    use crate::test_support::{ScriptedExecutor, TestHome, verdict};

    #[test]
    fn loop_runs_to_completion() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![
            verdict(Decision::Pending, "implemented"),
            verdict(Decision::Ok, "accepted"),
        ]);

        let mut seen = Vec::new();
        let outcome = run_loop(home.root(), &executor, |turn| seen.push(turn.turn))
            .expect("loop");

        // pick, implement, review
        assert_eq!(outcome.turns_executed, 3);
        assert_eq!(outcome.stop, LoopStop::Complete);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn loop_stops_at_max_turns() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let paths = home.paths();
        write_settings(
            &paths.config_path,
            &Settings {
                max_turns: 2,
                ..Settings::default()
            },
        )
        .expect("write settings");

        // Review keeps requesting changes, so the task never completes.
        let executor = ScriptedExecutor::new(vec![
            verdict(Decision::Pending, "implemented"),
            verdict(Decision::NeedsChanges, "try again"),
            verdict(Decision::Pending, "implemented again"),
        ]);

        let outcome = run_loop(home.root(), &executor, |_| {}).expect("loop");
        assert_eq!(outcome.turns_executed, 2);
        assert_eq!(
            outcome.stop,
            LoopStop::MaxTurnsExceeded {
                next_turn: 3,
                max_turns: 2
            }
        );
    }

    #[test]
    fn loop_returns_complete_without_turns_when_already_done() {
        let home = TestHome::new().expect("home");
        home.register(TaskType::Sbi, "Add login", "Login form").expect("register");
        let executor = ScriptedExecutor::new(vec![
            verdict(Decision::Pending, "implemented"),
            verdict(Decision::Ok, "accepted"),
        ]);
        run_loop(home.root(), &executor, |_| {}).expect("first loop");

        let idle = ScriptedExecutor::new(Vec::new());
        let outcome = run_loop(home.root(), &idle, |_| {}).expect("second loop");
        assert_eq!(outcome.turns_executed, 0);
        assert_eq!(outcome.stop, LoopStop::Complete);
    }
}
