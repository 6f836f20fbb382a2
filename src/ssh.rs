use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::load_config;

/// Whether the remote greeted us, e.g. GitHub's `Hi <user>! You've successfully authenticated`.
///
/// `ssh -T` exits non-zero even on success because no shell is granted, so
/// the greeting is the only reliable signal.
fn greeted(output: &str) -> bool {
    output.lines().any(|l| l.trim_start().starts_with("Hi"))
}

/// Verify that the SSH credential is accepted by `host` (e.g. `git@github.com`).
///
/// # Errors
/// Returns an error if `ssh` cannot be run or the host does not greet us.
pub fn check_ssh(host: &str, key: Option<&Path>) -> Result<()> {
    let mut cmd = Command::new("ssh");
    cmd.args(["-T", "-o", "StrictHostKeyChecking=no", "-o", "BatchMode=yes"]);
    if let Some(k) = key {
        cmd.arg("-i").arg(k);
    }
    cmd.arg(host).stdin(Stdio::null());

    tracing::info!("checking ssh access to {}", host);
    let output = cmd.output().context("failed to run ssh")?;
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        tracing::info!(target: "ssh", "{}", line);
    }

    if !greeted(&text) {
        bail!(
            "could not authenticate to {}; check that the SSH key is set up correctly",
            host
        );
    }
    Ok(())
}

/// CLI command: check the configured SSH credential.
pub fn cmd_check_ssh(config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    check_ssh(&cfg.git.ssh_host, cfg.ssh_key().as_deref())?;
    println!("ssh access to {} is working", cfg.git.ssh_host);
    Ok(())
}
