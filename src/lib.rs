//! Crate entry point for **repo-updater**.
//!
//! This library provides the implementation behind the `repo-updater` CLI:
//! for each configured repository it clones a fresh checkout, installs its
//! requirements, runs its update script with the selected forces, and
//! commits and pushes whatever changed.
//!
//! Each submodule encapsulates one responsibility (config parsing, git
//! operations, the update pipeline, etc.). The `pub use` re-exports make the
//! CLI commands and pipeline types accessible from the crate root.

mod config;
mod forces;
mod git;
mod logging;
mod paths;
mod repo;
mod ssh;
mod update;

#[cfg(test)]
mod test_support;

pub use config::{Config, RepoGroup, cmd_list, load_config};
pub use forces::{ForceSelection, Forces, cmd_options};
pub use git::COMMIT_MESSAGE;
pub use logging::init_logging;
pub use paths::updater_home;
pub use repo::{RepoDescriptor, descriptors, ssh_url};
pub use ssh::{check_ssh, cmd_check_ssh};
pub use update::{
    CancellationToken, LogSink, Outcome, ProgressTable, RepoStatus, RunContext, RunOptions,
    RunSummary, Settings, StatusSink, cmd_run, cmd_stop, installable, process_repo, run,
};
