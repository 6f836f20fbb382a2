mod cancel;
mod deps;
mod driver;
mod processor;
mod script;
mod status;

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use crate::config::load_config;
use crate::forces::{ForceSelection, Forces};
use crate::paths::paths;
use crate::repo::{RepoDescriptor, descriptors, select};
use crate::ssh::check_ssh;

pub use cancel::{CancellationToken, request_stop};
pub use deps::installable;
pub use driver::{RunContext, RunSummary, run};
pub use processor::{Outcome, Settings, process_repo};
pub use status::{LogSink, ProgressTable, RepoStatus, StatusSink};

/// Options for one `run` invocation.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    /// Repository names (or `owner/name`) to process; empty means all.
    pub only: Vec<String>,
    pub forces: ForceSelection,
    pub skip_ssh_check: bool,
    pub no_progress: bool,
}

/// Process the configured repositories one after another.
///
/// High-level flow:
/// 1. Load `config.toml`, build the forces (CLI over config defaults), and
///    select repositories.
/// 2. Verify SSH access unless skipped. Any failure so far aborts the command.
/// 3. Run the pipeline over the selection with a status row per repository.
///    Per-repository failures are shown on their row and in the summary;
///    they never fail the command.
/// 4. `repo-updater stop` from another shell stops the run after the current
///    repository.
pub fn cmd_run(opts: RunOptions) -> Result<()> {
    let p = paths()?;
    let cfg = load_config(opts.config.as_deref())?;
    let forces = Forces::build(opts.forces.over(&cfg.forces))?;
    let repos = select(descriptors(&cfg.groups), &opts.only)?;
    if repos.is_empty() {
        eprintln!("no repositories selected");
        return Ok(());
    }

    let settings = Settings::from_config(&cfg, &p);
    if !opts.skip_ssh_check {
        check_ssh(&cfg.git.ssh_host, settings.ssh_key.as_deref())?;
    }
    fs::create_dir_all(&settings.workdir)
        .with_context(|| format!("failed to create {}", settings.workdir.display()))?;

    let token = CancellationToken::with_stop_file(&p.stop_file)?;
    tracing::info!(
        "processing {} repositories with forces {}",
        repos.len(),
        forces.to_json()?
    );

    let mut ctx = RunContext::new(repos, token);
    let process = |repo: &RepoDescriptor, forces: &Forces| process_repo(&settings, repo, forces);
    let summary = if opts.no_progress {
        run(&mut ctx, &forces, &mut LogSink, process)
    } else {
        let mut table = ProgressTable::new(ctx.repos());
        run(&mut ctx, &forces, &mut table, process)
    };
    ctx.token().release()?;

    print_summary(&ctx, &summary);
    Ok(())
}

/// CLI command: ask a running `repo-updater run` to stop after its current repository.
pub fn cmd_stop() -> Result<()> {
    let p = paths()?;
    request_stop(&p.stop_file)?;
    println!("stop requested; the repository in progress will finish first");
    Ok(())
}

fn print_summary(ctx: &RunContext, summary: &RunSummary) {
    println!();
    for (i, (repo, status)) in ctx.repos().iter().zip(ctx.statuses()).enumerate() {
        let label = match status {
            RepoStatus::Finished => status.label().green(),
            RepoStatus::Error => status.label().red(),
            RepoStatus::Working => status.label().yellow(),
            RepoStatus::Waiting => status.label().dimmed(),
        };
        println!("{:>3}  {}  {}", i + 1, repo.display(), label);
    }
    println!(
        "\npushed {}, unchanged {}, failed {}, not started {}{}",
        summary.pushed,
        summary.unchanged,
        summary.failed,
        summary.not_started,
        if summary.stopped { " (stopped)" } else { "" }
    );
}
