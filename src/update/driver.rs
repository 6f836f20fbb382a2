use anyhow::{Result, anyhow, bail};

use super::cancel::CancellationToken;
use super::processor::Outcome;
use super::status::{RepoStatus, StatusSink};
use crate::forces::Forces;
use crate::repo::RepoDescriptor;

/// State of one run: the selected repositories, their statuses, and the stop
/// signal. Indices are 1-based, matching the status table.
#[derive(Debug)]
pub struct RunContext {
    repos: Vec<RepoDescriptor>,
    statuses: Vec<RepoStatus>,
    token: CancellationToken,
}

impl RunContext {
    pub fn new(repos: Vec<RepoDescriptor>, token: CancellationToken) -> Self {
        let statuses = vec![RepoStatus::Waiting; repos.len()];
        Self {
            repos,
            statuses,
            token,
        }
    }

    pub fn repos(&self) -> &[RepoDescriptor] {
        &self.repos
    }

    pub fn statuses(&self) -> &[RepoStatus] {
        &self.statuses
    }

    pub fn status(&self, index: usize) -> Option<RepoStatus> {
        index
            .checked_sub(1)
            .and_then(|i| self.statuses.get(i))
            .copied()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Move repository `index` to `next`.
    ///
    /// # Errors
    /// - `index` is out of range.
    /// - `next` is not the successor of the current status.
    /// - Another repository is already working.
    pub fn advance(&mut self, index: usize, next: RepoStatus) -> Result<()> {
        let current = self
            .status(index)
            .ok_or_else(|| anyhow!("no repository at index {}", index))?;
        if !current.can_advance_to(next) {
            bail!(
                "repository {} cannot go from {} to {}",
                index,
                current,
                next
            );
        }
        if next == RepoStatus::Working
            && let Some(busy) = self.statuses.iter().position(|s| *s == RepoStatus::Working)
        {
            bail!("repository {} is already working", busy + 1);
        }
        self.statuses[index - 1] = next;
        Ok(())
    }
}

/// Tally of a finished (or stopped) run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pushed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub not_started: usize,
    pub stopped: bool,
}

/// Process every repository in `ctx` in order until done or stopped.
///
/// The stop signal is checked before each repository, so a stop requested
/// while repository k is working lets k finish and prevents k+1 from
/// starting. A failing repository is logged and marked `error`; it never
/// aborts the run.
pub fn run<S, F>(ctx: &mut RunContext, forces: &Forces, sink: &mut S, mut process: F) -> RunSummary
where
    S: StatusSink + ?Sized,
    F: FnMut(&RepoDescriptor, &Forces) -> Result<Outcome>,
{
    let mut summary = RunSummary::default();
    let total = ctx.repos.len();

    for index in 1..=total {
        if ctx.token.is_cancelled() {
            summary.stopped = true;
            summary.not_started = total - index + 1;
            tracing::warn!(
                "stop requested; {} repositories were not started",
                summary.not_started
            );
            break;
        }

        let repo = ctx.repos[index - 1].clone();
        let span = tracing::info_span!("repo", index, name = %repo.name);
        let _guard = span.enter();

        transition(ctx, sink, index, RepoStatus::Working);
        let status = match process(&repo, forces) {
            Ok(Outcome::Unchanged) => {
                summary.unchanged += 1;
                tracing::info!("{} is up to date", repo.display());
                RepoStatus::Finished
            }
            Ok(Outcome::Pushed { commit }) => {
                summary.pushed += 1;
                tracing::info!("{} pushed {}", repo.display(), commit);
                RepoStatus::Finished
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!("{} failed: {:#}", repo.display(), e);
                RepoStatus::Error
            }
        };
        transition(ctx, sink, index, status);
    }

    tracing::info!("finished processing repositories");
    summary
}

fn transition<S>(ctx: &mut RunContext, sink: &mut S, index: usize, status: RepoStatus)
where
    S: StatusSink + ?Sized,
{
    match ctx.advance(index, status) {
        Ok(()) => sink.update(index, status),
        Err(e) => tracing::warn!("{:#}", e),
    }
}
