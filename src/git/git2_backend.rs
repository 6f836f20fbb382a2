use anyhow::{Context, Result, anyhow, bail};
use git2::{
    Commit, Cred, CredentialType, FetchOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature, Tree, build::RepoBuilder,
};
use std::cell::RefCell;
use std::fs;
use std::path::Path;

const FALLBACK_NAME: &str = "repo-updater";
const FALLBACK_EMAIL: &str = "repo-updater@localhost";

/// libgit2 re-invokes the credential callback after every rejected attempt.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Build `RemoteCallbacks` that authenticate over SSH.
///
/// Uses the configured private key when given, otherwise the SSH agent,
/// falling back to default credentials for non-SSH transports.
fn remote_callbacks(ssh_key: Option<&Path>) -> RemoteCallbacks<'_> {
    let mut attempts = 0;
    let mut cb = RemoteCallbacks::new();
    cb.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("ssh authentication failed"));
        }
        let user = username_from_url.unwrap_or("git");
        if allowed.contains(CredentialType::SSH_KEY) {
            return match ssh_key {
                Some(key) => Cred::ssh_key(user, None, key, None),
                None => Cred::ssh_key_from_agent(user),
            };
        }
        Cred::default()
    });
    cb
}

/// Clone `url` into `dest`, removing anything already at `dest` first.
///
/// # Errors
/// Returns an error if the old checkout cannot be removed or the clone fails.
pub fn clone_fresh(url: &str, dest: &Path, ssh_key: Option<&Path>) -> Result<Repository> {
    if dest.exists() {
        fs::remove_dir_all(dest)
            .with_context(|| format!("failed to clear {}", dest.display()))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(remote_callbacks(ssh_key));

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fo);
    builder
        .clone(url, dest)
        .with_context(|| format!("git clone {}", url))
}

/// Stage every change in the working tree, including deletions.
pub fn stage_all(repo: &Repository) -> Result<()> {
    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write().context("failed to write index")?;
    Ok(())
}

fn head_tree(repo: &Repository) -> Option<Tree<'_>> {
    repo.head().ok().and_then(|h| h.peel_to_tree().ok())
}

/// Whether the index differs from the tree of `HEAD`.
///
/// A repository without commits counts as changed once anything is staged.
pub fn has_staged_changes(repo: &Repository) -> Result<bool> {
    let index = repo.index()?;
    let tree = head_tree(repo);
    let diff = repo.diff_tree_to_index(tree.as_ref(), Some(&index), None)?;
    Ok(diff.deltas().len() > 0)
}

/// Commit the current index on top of `HEAD`.
///
/// The author is taken from git configuration when available, otherwise a
/// fixed `repo-updater` identity is used.
pub fn commit_staged(repo: &Repository, message: &str) -> Result<Oid> {
    let mut index = repo.index()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = repo
        .signature()
        .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .context("git commit")
}

/// Push the branch `HEAD` points at to the same branch on `origin`.
///
/// # Errors
/// Returns an error if `HEAD` is detached, the transport fails, or the remote
/// rejects the reference update.
pub fn push_head(repo: &Repository, ssh_key: Option<&Path>) -> Result<()> {
    let head = repo.head()?;
    if !head.is_branch() {
        bail!("HEAD is detached; refusing to push");
    }
    let refname = head
        .name()
        .ok_or_else(|| anyhow!("invalid HEAD reference name"))?
        .to_string();
    let refspec = format!("{refname}:{refname}");

    let rejected: RefCell<Vec<String>> = RefCell::new(Vec::new());
    let mut cb = remote_callbacks(ssh_key);
    cb.push_update_reference(|name, status| {
        if let Some(msg) = status {
            rejected.borrow_mut().push(format!("{name}: {msg}"));
        }
        Ok(())
    });
    let mut po = PushOptions::new();
    po.remote_callbacks(cb);

    let mut remote = repo.find_remote("origin")?;
    remote
        .push(&[refspec.as_str()], Some(&mut po))
        .context("git push origin")?;

    let rejected = rejected.borrow();
    if !rejected.is_empty() {
        bail!("push rejected: {}", rejected.join("; "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_remote, remote_head};

    #[test]
    fn clone_fresh_replaces_existing_directory() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(td.path(), &[("README.md", "hello\n")]);
        let dest = td.path().join("work").join("checkout");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        clone_fresh(remote.to_str().unwrap(), &dest, None).unwrap();
        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("README.md").is_file());
    }

    #[test]
    fn clone_fresh_reports_url_on_failure() {
        let td = tempfile::tempdir().unwrap();
        let missing = td.path().join("no-such-remote");
        let Err(err) = clone_fresh(missing.to_str().unwrap(), &td.path().join("c"), None) else {
            panic!("clone of a missing remote should fail");
        };
        assert!(format!("{err:#}").contains("git clone"));
    }

    #[test]
    fn clean_checkout_has_no_staged_changes() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(td.path(), &[("a.txt", "a\n")]);
        let repo = clone_fresh(remote.to_str().unwrap(), &td.path().join("c"), None).unwrap();
        stage_all(&repo).unwrap();
        assert!(!has_staged_changes(&repo).unwrap());
    }

    #[test]
    fn stage_all_picks_up_new_modified_and_deleted_files() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(td.path(), &[("keep.txt", "1\n"), ("gone.txt", "x\n")]);
        let dest = td.path().join("c");
        let repo = clone_fresh(remote.to_str().unwrap(), &dest, None).unwrap();

        fs::write(dest.join("keep.txt"), "2\n").unwrap();
        fs::remove_file(dest.join("gone.txt")).unwrap();
        fs::write(dest.join("new.txt"), "n\n").unwrap();
        stage_all(&repo).unwrap();
        assert!(has_staged_changes(&repo).unwrap());

        let head = repo.head().unwrap().peel_to_tree().unwrap();
        let index = repo.index().unwrap();
        let diff = repo.diff_tree_to_index(Some(&head), Some(&index), None).unwrap();
        assert_eq!(diff.deltas().len(), 3);
    }

    #[test]
    fn commit_and_push_update_remote_branch() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(td.path(), &[("a.txt", "a\n")]);
        let dest = td.path().join("c");
        let repo = clone_fresh(remote.to_str().unwrap(), &dest, None).unwrap();

        fs::write(dest.join("b.txt"), "b\n").unwrap();
        stage_all(&repo).unwrap();
        let oid = commit_staged(&repo, crate::git::COMMIT_MESSAGE).unwrap();
        push_head(&repo, None).unwrap();

        let (remote_oid, message) = remote_head(&remote);
        assert_eq!(remote_oid, oid);
        assert_eq!(message, "Automatic commit by repo-updater.");
    }
}
