use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;

use crate::logging::{attach_table, detach_table};
use crate::repo::RepoDescriptor;

/// Processing state of one repository in a run.
///
/// Transitions only move forward: waiting → working → finished | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    Waiting,
    Working,
    Finished,
    Error,
}

impl RepoStatus {
    pub fn keyword(self) -> &'static str {
        match self {
            RepoStatus::Waiting => "waiting",
            RepoStatus::Working => "working",
            RepoStatus::Finished => "finished",
            RepoStatus::Error => "error",
        }
    }

    /// Label shown in the status column.
    pub fn label(self) -> &'static str {
        match self {
            RepoStatus::Waiting => "⏺️ Waiting",
            RepoStatus::Working => "🔄 Working",
            RepoStatus::Finished => "✅ Finished",
            RepoStatus::Error => "🅾️ Error",
        }
    }

    fn rank(self) -> u8 {
        match self {
            RepoStatus::Waiting => 0,
            RepoStatus::Working => 1,
            RepoStatus::Finished | RepoStatus::Error => 2,
        }
    }

    /// Whether `next` is the immediate successor of `self`.
    pub fn can_advance_to(self, next: RepoStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

/// Row style for a status: dim while waiting, a yellow spinner while
/// working, green or red once done.
fn row_style(status: RepoStatus) -> ProgressStyle {
    let template = match status {
        RepoStatus::Waiting => "  {wide_msg:.dim}",
        RepoStatus::Working => "{spinner:.yellow} {wide_msg}",
        RepoStatus::Finished => "  {wide_msg:.green}",
        RepoStatus::Error => "  {wide_msg:.red}",
    };
    ProgressStyle::with_template(template)
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Receives status transitions keyed by 1-based repository index.
pub trait StatusSink {
    fn update(&mut self, index: usize, status: RepoStatus);
}

impl<S: StatusSink + ?Sized> StatusSink for &mut S {
    fn update(&mut self, index: usize, status: RepoStatus) {
        (**self).update(index, status);
    }
}

/// Terminal table with one spinner row per repository.
///
/// Rows read `#  owner/name  <status label>`. While the table is alive, log
/// lines are printed above it instead of through it.
pub struct ProgressTable {
    mp: MultiProgress,
    rows: Vec<(String, ProgressBar)>,
}

impl ProgressTable {
    pub fn new(repos: &[RepoDescriptor]) -> Self {
        let mp = MultiProgress::new();
        let width = repos
            .iter()
            .map(|r| r.display().len())
            .max()
            .unwrap_or_default();
        let rows = repos
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let head = format!("{:>3}  {:<width$}", i + 1, r.display());
                let pb = mp.add(ProgressBar::new_spinner());
                pb.set_style(row_style(RepoStatus::Waiting));
                pb.set_message(format!("{}  {}", head, RepoStatus::Waiting.label()));
                (head, pb)
            })
            .collect();
        attach_table(&mp);
        Self { mp, rows }
    }
}

impl Drop for ProgressTable {
    fn drop(&mut self) {
        detach_table();
        let _ = self.mp.clear();
    }
}

impl StatusSink for ProgressTable {
    fn update(&mut self, index: usize, status: RepoStatus) {
        let Some((head, pb)) = index.checked_sub(1).and_then(|i| self.rows.get(i)) else {
            return;
        };
        let msg = format!("{}  {}", head, status.label());
        pb.set_style(row_style(status));
        match status {
            RepoStatus::Waiting => pb.set_message(msg),
            RepoStatus::Working => {
                pb.set_message(msg);
                pb.enable_steady_tick(Duration::from_millis(80));
            }
            RepoStatus::Finished | RepoStatus::Error => pb.finish_with_message(msg),
        }
    }
}

/// Reports transitions through the log instead of a terminal table.
pub struct LogSink;

impl StatusSink for LogSink {
    fn update(&mut self, index: usize, status: RepoStatus) {
        tracing::info!(index, status = status.keyword(), "{}", status.label());
    }
}
