use anyhow::{Context, Result};
use git2::Oid;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::deps::install_requirements;
use super::script::run_script;
use crate::config::{Config, DependencySettings, ScriptSettings};
use crate::forces::Forces;
use crate::git::{COMMIT_MESSAGE, clone_fresh, commit_staged, has_staged_changes, push_head, stage_all};
use crate::paths::Paths;
use crate::repo::RepoDescriptor;

/// Everything the processor needs from configuration, resolved once per run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workdir: PathBuf,
    pub script: ScriptSettings,
    pub dependencies: DependencySettings,
    pub ssh_key: Option<PathBuf>,
}

impl Settings {
    pub fn from_config(cfg: &Config, p: &Paths) -> Self {
        Self {
            workdir: cfg.workdir(p),
            script: cfg.script.clone(),
            dependencies: cfg.dependencies.clone(),
            ssh_key: cfg.ssh_key(),
        }
    }
}

/// Result of processing a repository that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The script produced no changes; the checkout was deleted.
    Unchanged,
    /// Changes were committed and pushed to `origin`.
    Pushed { commit: Oid },
}

/// Clone, install, run the update script, and publish any changes.
///
/// The checkout lives at `<workdir>/<name>` and is recreated from scratch.
/// It is deleted when nothing changed and kept after a push (or a failure)
/// for inspection.
///
/// # Errors
/// Returns an error from the first failing stage: clone, dependency install,
/// script run, commit, or push. A failed push leaves the local commit in
/// place.
pub fn process_repo(settings: &Settings, repo: &RepoDescriptor, forces: &Forces) -> Result<Outcome> {
    let url = repo.clone_url();
    let checkout = settings.workdir.join(&repo.name);
    tracing::info!("processing {} from {}", repo.display(), repo.url);

    let git_repo = clone_fresh(&url, &checkout, settings.ssh_key.as_deref())?;
    tracing::info!("cloned {} to {}", url, checkout.display());

    install_requirements(&checkout, &settings.dependencies)
        .context("dependency install failed")?;

    run_script(&checkout, &settings.script, &forces.to_json()?)?;

    remove_transient(&checkout, &settings.script.cleanup)?;

    stage_all(&git_repo)?;
    if !has_staged_changes(&git_repo)? {
        tracing::info!("no changes in {}; nothing to commit", repo.name);
        drop(git_repo);
        fs::remove_dir_all(&checkout)
            .with_context(|| format!("failed to remove {}", checkout.display()))?;
        return Ok(Outcome::Unchanged);
    }

    let commit = commit_staged(&git_repo, COMMIT_MESSAGE)?;
    tracing::info!("created commit {}; pushing", commit);
    push_head(&git_repo, settings.ssh_key.as_deref())
        .with_context(|| format!("commit {} was created but not pushed", commit))?;

    Ok(Outcome::Pushed { commit })
}

/// Delete build caches the script may leave behind. Missing ones are fine.
fn remove_transient(checkout: &Path, dirs: &[PathBuf]) -> Result<()> {
    for rel in dirs {
        let p = checkout.join(rel);
        match fs::remove_dir_all(&p) {
            Ok(()) => tracing::debug!("removed {}", p.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("failed to remove {}", p.display())),
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{make_remote, remote_commit_count, remote_head};

    /// Settings that run `update.sh` with `sh` and log installs to `<workdir>/installed.log`.
    fn settings(workdir: &Path) -> Settings {
        Settings {
            workdir: workdir.to_path_buf(),
            script: ScriptSettings {
                interpreter: "sh".to_string(),
                path: PathBuf::from("update.sh"),
                ..Default::default()
            },
            dependencies: DependencySettings {
                installer: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    r#"printf '%s\n' "$*" >> ../installed.log"#.to_string(),
                    "pip".to_string(),
                ],
                ..Default::default()
            },
            ssh_key: None,
        }
    }

    fn descriptor(remote: &Path) -> RepoDescriptor {
        RepoDescriptor::new("local", remote.to_str().unwrap())
    }

    #[test]
    fn unchanged_repository_is_deleted_and_not_committed() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(td.path(), &[("update.sh", "echo nothing to do\n")]);
        let work = td.path().join("work");

        let out = process_repo(&settings(&work), &descriptor(&remote), &Forces::default()).unwrap();

        assert_eq!(out, Outcome::Unchanged);
        assert!(!work.join("remote").exists());
        assert_eq!(remote_commit_count(&remote), 1);
    }

    #[test]
    fn changes_are_committed_once_and_pushed() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(
            td.path(),
            &[("update.sh", "printf '%s' \"$2\" > forces.json\n")],
        );
        let work = td.path().join("work");
        let forces = Forces {
            force_texts: vec!["readme".to_string()],
            ..Default::default()
        };

        let out = process_repo(&settings(&work), &descriptor(&remote), &forces).unwrap();

        let Outcome::Pushed { commit } = out else {
            panic!("expected a push, got {out:?}");
        };
        assert_eq!(remote_commit_count(&remote), 2);
        assert_eq!(
            remote_head(&remote),
            (commit, "Automatic commit by repo-updater.".to_string())
        );
        let checkout = work.join("remote");
        assert!(checkout.is_dir());
        assert_eq!(
            fs::read_to_string(checkout.join("forces.json")).unwrap(),
            forces.to_json().unwrap()
        );
    }

    #[test]
    fn build_caches_are_not_committed() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(
            td.path(),
            &[(
                "update.sh",
                "mkdir -p src/__pycache__ && echo x > src/__pycache__/main.pyc\n",
            )],
        );
        let work = td.path().join("work");

        let out = process_repo(&settings(&work), &descriptor(&remote), &Forces::default()).unwrap();

        assert_eq!(out, Outcome::Unchanged);
        assert_eq!(remote_commit_count(&remote), 1);
    }

    #[test]
    fn failing_script_skips_commit_and_push() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(
            td.path(),
            &[("update.sh", "echo generated > out.txt\nexit 2\n")],
        );
        let work = td.path().join("work");

        let err = process_repo(&settings(&work), &descriptor(&remote), &Forces::default())
            .unwrap_err();

        assert!(format!("{err:#}").contains("exited with"));
        assert_eq!(remote_commit_count(&remote), 1);
    }

    #[test]
    fn only_foreign_requirements_are_installed() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(
            td.path(),
            &[
                ("requirements.txt", "supervisely==1.0\nrequests==2.0\n"),
                ("update.sh", "true\n"),
            ],
        );
        let work = td.path().join("work");

        process_repo(&settings(&work), &descriptor(&remote), &Forces::default()).unwrap();

        let log = fs::read_to_string(work.join("installed.log")).unwrap();
        assert_eq!(log, "requests==2.0\n");
    }

    #[test]
    fn install_failure_stops_before_the_script() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(
            td.path(),
            &[
                ("requirements.txt", "requests==2.0\n"),
                ("update.sh", "echo ran > ran.txt\n"),
            ],
        );
        let work = td.path().join("work");
        let mut s = settings(&work);
        s.dependencies.installer = vec!["false".to_string()];

        let err = process_repo(&s, &descriptor(&remote), &Forces::default()).unwrap_err();

        assert!(format!("{err:#}").contains("dependency install failed"));
        assert!(!work.join("remote").join("ran.txt").exists());
        assert_eq!(remote_commit_count(&remote), 1);
    }

    #[test]
    fn previous_checkout_is_replaced() {
        let td = tempfile::tempdir().unwrap();
        let remote = make_remote(td.path(), &[("update.sh", "ls > listing.txt\n")]);
        let work = td.path().join("work");
        fs::create_dir_all(work.join("remote")).unwrap();
        fs::write(work.join("remote").join("leftover.txt"), "old").unwrap();

        process_repo(&settings(&work), &descriptor(&remote), &Forces::default()).unwrap();

        let listing = fs::read_to_string(work.join("remote").join("listing.txt")).unwrap();
        assert!(!listing.contains("leftover.txt"));
    }
}
