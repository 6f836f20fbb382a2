//! Fixtures shared by unit tests: throwaway bare remotes built with git2.

use git2::{IndexAddOption, Oid, Repository, Signature, build::RepoBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// Create `<root>/remote.git`, a bare repository whose single commit holds `files`.
pub fn make_remote(root: &Path, files: &[(&str, &str)]) -> PathBuf {
    let seed = root.join("seed");
    let repo = Repository::init(&seed).unwrap();
    for (rel, body) in files {
        let p = seed.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, body).unwrap();
    }
    let mut index = repo.index().unwrap();
    index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("seed", "seed@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    let remote = root.join("remote.git");
    RepoBuilder::new()
        .bare(true)
        .clone(seed.to_str().unwrap(), &remote)
        .unwrap();
    remote
}

/// Tip commit id and message of the remote's default branch.
pub fn remote_head(remote: &Path) -> (Oid, String) {
    let repo = Repository::open_bare(remote).unwrap();
    let commit = repo.head().unwrap().peel_to_commit().unwrap();
    (commit.id(), commit.message().unwrap_or_default().to_string())
}

/// Number of commits reachable from the remote's `HEAD`.
pub fn remote_commit_count(remote: &Path) -> usize {
    let repo = Repository::open_bare(remote).unwrap();
    let mut walk = repo.revwalk().unwrap();
    walk.push_head().unwrap();
    walk.count()
}
