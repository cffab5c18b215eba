//! Durable task lifecycle runner CLI.
//!
//! Drives a single task through pick -> implement -> review -> done using
//! the configured external coding agent, persisting state snapshots, an
//! append-only transition journal, and a health file under `.taskline/`.

use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use taskline::core::status::Step;
use taskline::core::task::{Task, TaskId, TaskType};
use taskline::exit_codes;
use taskline::io::config::load_settings;
use taskline::io::executor::AgentCliExecutor;
use taskline::io::health::read_health;
use taskline::io::init::{HomePaths, InitOptions, init_home};
use taskline::io::spec_doc::read_task_doc;
use taskline::io::task_store::{load_state, write_state};
use taskline::run::{LoopStop, run_loop};
use taskline::turn::run_turn;

#[derive(Parser)]
#[command(name = "taskline", version, about = "Durable task lifecycle runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the `.taskline/` home layout.
    Init {
        /// Overwrite existing taskline-owned files.
        #[arg(short, long)]
        force: bool,
    },
    /// Register the task to drive, from a markdown document or a title.
    Register {
        /// Markdown task document; its first heading becomes the title.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Explicit title (takes precedence over the document heading).
        #[arg(long)]
        title: Option<String>,
        /// Task type: EPIC, PBI, or SBI.
        #[arg(long, default_value = "SBI")]
        kind: String,
        /// Parent task id (EPIC/PBI parent of an SBI).
        #[arg(long)]
        parent: Option<String>,
    },
    /// Execute one workflow turn.
    Step,
    /// Run turns until the task completes or the turn budget is exhausted.
    Run,
    /// Print the current task state and health snapshot.
    Status,
}

fn main() {
    taskline::logging::init();
    match run() {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Register {
            file,
            title,
            kind,
            parent,
        } => cmd_register(&root, file.as_deref(), title, &kind, parent),
        Command::Step => cmd_step(&root),
        Command::Run => cmd_run(&root),
        Command::Status => cmd_status(&root),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_home(root, &InitOptions { force })?;
    println!("initialized {}", paths.home_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_register(
    root: &Path,
    file: Option<&Path>,
    title: Option<String>,
    kind: &str,
    parent: Option<String>,
) -> Result<i32> {
    let paths = HomePaths::new(root);
    if !paths.home_dir.is_dir() {
        return Err(anyhow!("missing .taskline (run `taskline init` first)"));
    }
    if paths.state_path.exists() {
        return Err(anyhow!(
            "a task is already registered at {}",
            paths.state_path.display()
        ));
    }

    let kind = TaskType::try_from(kind)?;
    let doc = file.map(read_task_doc).transpose()?;
    let title = title
        .or_else(|| doc.as_ref().and_then(|doc| doc.title.clone()))
        .ok_or_else(|| anyhow!("no title: pass --title or a document with a heading"))?;
    let description = doc.map(|doc| doc.body).unwrap_or_default();

    let mut task = Task::new(kind, title, description)?;
    if let Some(parent) = parent {
        task = task.with_parent(TaskId::from(parent));
    }
    write_state(&paths.state_path, &task, 0)?;

    println!("registered {} {} \"{}\"", kind, task.id(), task.title());
    Ok(exit_codes::OK)
}

fn cmd_step(root: &Path) -> Result<i32> {
    let executor = agent_executor(root)?;
    let outcome = run_turn(root, &executor)?;

    if outcome.complete && outcome.step == Step::Done {
        println!("task {} already complete", outcome.task_id);
        return Ok(exit_codes::COMPLETE);
    }
    println!(
        "turn {}: {} -> {} (decision {})",
        outcome.turn, outcome.step, outcome.status, outcome.decision
    );
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path) -> Result<i32> {
    let executor = agent_executor(root)?;
    let outcome = run_loop(root, &executor, |turn| {
        println!(
            "turn {}: {} -> {} (decision {})",
            turn.turn, turn.step, turn.status, turn.decision
        );
    })?;

    match outcome.stop {
        LoopStop::Complete => {
            println!(
                "task {} complete after {} turn(s)",
                outcome.task_id, outcome.turns_executed
            );
            if outcome.turns_executed == 0 {
                Ok(exit_codes::COMPLETE)
            } else {
                Ok(exit_codes::OK)
            }
        }
        LoopStop::MaxTurnsExceeded {
            next_turn,
            max_turns,
        } => {
            println!(
                "stopping before turn {next_turn}: max_turns={max_turns} exhausted (task {})",
                outcome.task_id
            );
            Ok(exit_codes::MAX_TURNS)
        }
    }
}

fn cmd_status(root: &Path) -> Result<i32> {
    let paths = HomePaths::new(root);
    let (task, turn) = load_state(&paths.state_path)
        .context("load task state (run `taskline register` first)")?;

    println!("task {} [{}] \"{}\"", task.id(), task.kind(), task.title());
    if let Some(parent) = task.parent_id() {
        println!("parent {parent}");
    }
    println!("status {} (step {}), turn {}", task.status(), task.step(), turn);
    println!("updated {}", task.updated_at().to_rfc3339());

    match read_health(&paths.health_path) {
        Ok(health) => {
            let state = if health.ok { "ok" } else { "error" };
            println!("health {} at {} (turn {}, step {})", state, health.ts, health.turn, health.step);
            if !health.error.is_empty() {
                println!("  {}", health.error);
            }
        }
        Err(_) => println!("health not reported yet"),
    }
    Ok(exit_codes::OK)
}

fn agent_executor(root: &Path) -> Result<AgentCliExecutor> {
    let paths = HomePaths::new(root);
    let settings = load_settings(&paths.config_path)?;
    Ok(AgentCliExecutor::new(settings.agent.command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["taskline", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["taskline", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_register_defaults_to_sbi() {
        let cli = Cli::parse_from(["taskline", "register", "--title", "Add login"]);
        match cli.command {
            Command::Register { kind, title, file, parent } => {
                assert_eq!(kind, "SBI");
                assert_eq!(title.as_deref(), Some("Add login"));
                assert!(file.is_none());
                assert!(parent.is_none());
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn parse_register_with_document() {
        let cli = Cli::parse_from([
            "taskline", "register", "--file", "task.md", "--kind", "PBI", "--parent", "01ABC",
        ]);
        match cli.command {
            Command::Register { kind, file, parent, .. } => {
                assert_eq!(kind, "PBI");
                assert_eq!(file, Some(PathBuf::from("task.md")));
                assert_eq!(parent.as_deref(), Some("01ABC"));
            }
            _ => panic!("expected register"),
        }
    }
}
