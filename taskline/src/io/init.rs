//! Home directory layout and scaffolding for `.taskline/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::io::atomic::write_atomic_text;
use crate::io::config::{Settings, write_settings};
use crate::io::prompt::{IMPLEMENT_TEMPLATE, REVIEW_TEMPLATE};

/// All canonical paths within `.taskline/` for a project root.
///
/// Resolved once and passed by reference, never through a global.
#[derive(Debug, Clone)]
pub struct HomePaths {
    pub root: PathBuf,
    pub home_dir: PathBuf,
    pub var_dir: PathBuf,
    pub turns_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
    pub journal_path: PathBuf,
    pub health_path: PathBuf,
    pub lock_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl HomePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let home_dir = root.join(".taskline");
        let var_dir = home_dir.join("var");
        Self {
            root: root.clone(),
            home_dir: home_dir.clone(),
            var_dir: var_dir.clone(),
            turns_dir: var_dir.join("turns"),
            prompts_dir: home_dir.join("prompts"),
            config_path: home_dir.join("config.json"),
            state_path: var_dir.join("state.json"),
            journal_path: var_dir.join("journal.ndjson"),
            health_path: var_dir.join("health.json"),
            // Advisory lock; managed by external tooling, never by this crate.
            lock_path: var_dir.join("state.lock"),
            gitignore_path: home_dir.join(".gitignore"),
        }
    }

    /// Directory holding per-turn artifacts (`var/turns/<turn>/`).
    pub fn turn_dir(&self, turn: u64) -> PathBuf {
        self.turns_dir.join(turn.to_string())
    }
}

/// Options for `init_home`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing taskline-owned files.
    pub force: bool,
}

const HOME_GITIGNORE: &str = "var/\n";

/// Create `.taskline/` scaffolding in `root`.
///
/// Fails if `.taskline/` already exists unless `options.force` is set.
pub fn init_home(root: &Path, options: &InitOptions) -> Result<HomePaths> {
    let paths = HomePaths::new(root);
    if paths.home_dir.exists() && !options.force {
        return Err(anyhow!(
            "taskline init: .taskline already exists (use --force to overwrite)"
        ));
    }
    if paths.home_dir.exists() && !paths.home_dir.is_dir() {
        return Err(anyhow!(
            "taskline init: .taskline exists but is not a directory"
        ));
    }

    create_dir(&paths.home_dir)?;
    create_dir(&paths.var_dir)?;
    create_dir(&paths.turns_dir)?;
    create_dir(&paths.prompts_dir)?;

    write_text(&paths.gitignore_path, HOME_GITIGNORE)?;
    write_settings(&paths.config_path, &Settings::default())?;
    write_text(&paths.prompts_dir.join("implement.md"), IMPLEMENT_TEMPLATE)?;
    write_text(&paths.prompts_dir.join("review.md"), REVIEW_TEMPLATE)?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    write_atomic_text(path, contents, false)
        .with_context(|| format!("write file {}", path.display()))
}
