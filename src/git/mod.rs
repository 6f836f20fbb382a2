//! Git integration layer.
//!
//! This module wraps the `git2` backend and re-exports only the operations the
//! update pipeline needs: a fresh clone, staging, change detection, commit and
//! push. Other modules should use these instead of depending on `git2_backend`.

mod git2_backend;

pub use git2_backend::{clone_fresh, commit_staged, has_staged_changes, push_head, stage_all};

/// Message used for every commit the updater creates.
pub const COMMIT_MESSAGE: &str = "Automatic commit by repo-updater.";
