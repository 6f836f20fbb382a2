use anyhow::{Context, Result, bail};
use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader};
use std::iter;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use crate::config::ScriptSettings;

/// `PYTHONPATH` with `checkout` in front of the inherited entries.
pub fn python_path(checkout: &Path, inherited: Option<&OsStr>) -> Result<OsString> {
    let rest = inherited.map(env::split_paths).into_iter().flatten();
    env::join_paths(iter::once(checkout.to_path_buf()).chain(rest))
        .with_context(|| format!("cannot add {} to PYTHONPATH", checkout.display()))
}

/// Run the checkout's update script and stream its output into the log.
///
/// The script is invoked as `<interpreter> <path> --forces <forces_json>` from
/// the checkout root, with the checkout prepended to `PYTHONPATH`. Stdout
/// lines are logged at info and stderr lines at warn, both under `script`.
///
/// # Errors
/// Returns an error if the script is missing, cannot be spawned, or exits
/// with a non-zero status.
pub fn run_script(checkout: &Path, settings: &ScriptSettings, forces_json: &str) -> Result<()> {
    let script = checkout.join(&settings.path);
    if !script.is_file() {
        bail!("update script not found: {}", settings.path.display());
    }

    let pythonpath = python_path(checkout, env::var_os("PYTHONPATH").as_deref())?;
    tracing::info!(
        "running {} {} --forces '{}'",
        settings.interpreter,
        settings.path.display(),
        forces_json
    );

    let mut child = Command::new(&settings.interpreter)
        .arg(&script)
        .arg("--forces")
        .arg(forces_json)
        .current_dir(checkout)
        .env("PYTHONPATH", pythonpath)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {}", settings.interpreter))?;

    let stderr_pump = child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            for line in BufReader::new(stderr).split(b'\n').map_while(Result::ok) {
                tracing::warn!(target: "script", "{}", String::from_utf8_lossy(&line).trim_end());
            }
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).split(b'\n') {
            let line = line.context("failed to read script output")?;
            tracing::info!(target: "script", "{}", String::from_utf8_lossy(&line).trim_end());
        }
    }

    let status = child.wait().context("failed to wait for script")?;
    if let Some(pump) = stderr_pump {
        let _ = pump.join();
    }
    if !status.success() {
        bail!("script {} exited with {}", settings.path.display(), status);
    }
    tracing::info!("script finished successfully");
    Ok(())
}
