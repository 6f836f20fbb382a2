//! # repo-updater
//!
//! **repo-updater** refreshes generated content across many repositories.
//!
//! Features:
//! - Repositories are listed in `$(repo-updater home)/config.toml`, grouped by owner
//! - `repo-updater run` clones each one, installs its requirements, runs its
//!   update script with the selected forces, and pushes any changes
//! - `repo-updater stop` halts a running update after the current repository
//! - `repo-updater list` shows the configured repositories
//! - `repo-updater options` shows the recognized force options
//! - `repo-updater check-ssh` verifies the git SSH credential
//! - `repo-updater home` prints the home directory
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use repo_updater::{
    ForceSelection, RunOptions, cmd_check_ssh, cmd_list, cmd_options, cmd_run, cmd_stop,
    init_logging, updater_home,
};
use std::path::PathBuf;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "repo-updater",
    version,
    about = "repo-updater - batch update, commit and push generated repository content",
    arg_required_else_help = true
)]
struct Cli {
    /// Path to config.toml (default: $(repo-updater home)/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Process the configured repositories
    Run(RunArgs),
    /// Stop a running update after the current repository
    Stop,
    /// List configured repositories
    List,
    /// Show recognized force options
    Options,
    /// Verify that the SSH key is accepted by the git host
    CheckSsh,
    /// Show repo-updater home directory
    Home,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Only process these repositories (name or owner/name); repeatable
    #[arg(long = "only", value_name = "REPO")]
    only: Vec<String>,
    /// Statistics to regenerate
    #[arg(long, value_delimiter = ',', value_name = "OPT")]
    stats: Vec<String>,
    /// Visuals to regenerate
    #[arg(long, value_delimiter = ',', value_name = "OPT")]
    visuals: Vec<String>,
    /// Texts to regenerate
    #[arg(long, value_delimiter = ',', value_name = "OPT")]
    texts: Vec<String>,
    /// Force re-downloading the dataset URL
    #[arg(long, overrides_with = "no_force_download_url")]
    force_download_url: bool,
    /// Do not re-download the dataset URL, even if enabled in config
    #[arg(long)]
    no_force_download_url: bool,
    /// Force the demo sample project
    #[arg(long, overrides_with = "no_force_demo")]
    force_demo: bool,
    /// Do not force the demo sample project, even if enabled in config
    #[arg(long)]
    no_force_demo: bool,
    /// Skip the SSH access check before starting
    #[arg(long)]
    skip_ssh_check: bool,
    /// Report progress through the log instead of a status table
    #[arg(long)]
    no_progress: bool,
}

/// CLI entry point.
///
/// Parses arguments with `clap` and executes the selected subcommand.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(cmd) = cli.cmd else {
        return Ok(());
    };
    init_logging(cli.verbose);

    match cmd {
        Cmd::Run(args) => cmd_run(RunOptions {
            config: cli.config,
            only: args.only,
            forces: ForceSelection {
                stats: args.stats,
                visuals: args.visuals,
                texts: args.texts,
                download_sly_url: toggle(args.force_download_url, args.no_force_download_url),
                demo: toggle(args.force_demo, args.no_force_demo),
            },
            skip_ssh_check: args.skip_ssh_check,
            no_progress: args.no_progress,
        }),
        Cmd::Stop => cmd_stop(),
        Cmd::List => cmd_list(cli.config.as_deref()),
        Cmd::Options => cmd_options(),
        Cmd::CheckSsh => cmd_check_ssh(cli.config.as_deref()),
        Cmd::Home => {
            println!("{}", updater_home()?.display());
            Ok(())
        }
    }
}

/// Explicit on/off from a `--flag` / `--no-flag` pair, `None` when neither was given.
fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
