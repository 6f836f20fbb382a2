use anyhow::{Result, bail};
use regex::Regex;
use std::sync::LazyLock;

use crate::config::RepoGroup;

static HTTPS_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:[^@/]+@)?([^/]+)/(.+?)(?:\.git)?/?$").expect("valid remote regex")
});

/// A repository selected for processing.
///
/// - `owner`: group the entry was configured under, e.g. `"dataset-ninja"`.
/// - `name`: last URL segment without `.git`; also the checkout directory name.
/// - `url`: remote URL as configured (usually HTTPS form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    pub owner: String,
    pub name: String,
    pub url: String,
}

impl RepoDescriptor {
    pub fn new(owner: &str, url: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: repo_name(url),
            url: url.to_string(),
        }
    }

    /// Human-friendly `owner/name`.
    pub fn display(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Remote URL used for clone and push.
    pub fn clone_url(&self) -> String {
        ssh_url(&self.url)
    }
}

/// Derive the repository name from a remote URL or path.
///
/// `https://github.com/owner/name.git` → `name`
pub fn repo_name(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Convert an HTTPS remote into its SSH form.
///
/// `https://github.com/owner/name` → `git@github.com:owner/name.git`
///
/// URLs that are not HTTPS (SSH form, `file://`, local paths) are returned
/// unchanged.
pub fn ssh_url(url: &str) -> String {
    match HTTPS_REMOTE.captures(url) {
        Some(c) => format!("git@{}:{}.git", &c[1], &c[2]),
        None => url.to_string(),
    }
}

/// Expand configured groups into an ordered list of descriptors.
///
/// Bare names are expanded to `https://github.com/<owner>/<name>`. Blank
/// entries are skipped.
pub fn descriptors(groups: &[RepoGroup]) -> Vec<RepoDescriptor> {
    let mut out = Vec::new();
    for g in groups {
        for entry in &g.repos {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let url = if entry.contains('/') || entry.contains(':') {
                entry.to_string()
            } else {
                format!("https://github.com/{}/{}", g.owner, entry)
            };
            out.push(RepoDescriptor::new(&g.owner, &url));
        }
    }
    out
}

/// Keep only the repositories named in `only`, preserving configured order.
///
/// A selector matches either the bare name or `owner/name`. An empty selector
/// list selects everything.
///
/// # Errors
/// Returns an error if a selector matches no configured repository.
pub fn select(repos: Vec<RepoDescriptor>, only: &[String]) -> Result<Vec<RepoDescriptor>> {
    if only.is_empty() {
        return Ok(repos);
    }
    for want in only {
        if !repos.iter().any(|r| matches(r, want)) {
            bail!("unknown repository: {}", want);
        }
    }
    Ok(repos
        .into_iter()
        .filter(|r| only.iter().any(|want| matches(r, want)))
        .collect())
}

fn matches(r: &RepoDescriptor, want: &str) -> bool {
    r.name == want || r.display() == want
}
