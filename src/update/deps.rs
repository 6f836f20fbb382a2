use anyhow::{Context, Result, anyhow, bail};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::DependencySettings;

/// Manifest entries that should be installed.
///
/// Comments (whole-line or trailing `# ...`) and blank lines are skipped, as
/// is any entry mentioning one of the `exclude` names (the updater's own
/// packages, which the host environment already provides).
pub fn installable(manifest: &str, exclude: &[String]) -> Vec<String> {
    manifest
        .lines()
        .map(strip_comment)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| !exclude.iter().any(|x| l.contains(x.as_str())))
        .map(str::to_string)
        .collect()
}

/// Drop a comment: `#` at line start or after whitespace.
fn strip_comment(line: &str) -> &str {
    let line = line.trim();
    if line.starts_with('#') {
        return "";
    }
    let cut = line
        .char_indices()
        .find(|&(i, c)| c == '#' && line[..i].ends_with(char::is_whitespace));
    match cut {
        Some((i, _)) => line[..i].trim_end(),
        None => line,
    }
}

/// Install the checkout's declared dependencies one entry at a time.
///
/// Does nothing when the manifest is missing. Returns the number of entries
/// installed.
///
/// # Errors
/// Returns an error on the first entry whose installer exits unsuccessfully;
/// later entries are not attempted.
pub fn install_requirements(checkout: &Path, settings: &DependencySettings) -> Result<usize> {
    let manifest = checkout.join(&settings.manifest);
    if !manifest.is_file() {
        tracing::debug!("no {} in checkout", settings.manifest.display());
        return Ok(0);
    }

    let txt = fs::read_to_string(&manifest)
        .with_context(|| format!("failed to read {}", manifest.display()))?;
    let entries = installable(&txt, &settings.exclude);
    tracing::info!(
        "found {} requirements to install from {}",
        entries.len(),
        settings.manifest.display()
    );

    let (program, args) = settings
        .installer
        .split_first()
        .ok_or_else(|| anyhow!("dependencies.installer is empty"))?;

    for entry in &entries {
        tracing::info!(target: "deps", "installing {}", entry);
        let output = Command::new(program)
            .args(args)
            .args(entry.split_whitespace())
            .current_dir(checkout)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {}", program))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(target: "deps", "{}", line);
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "failed to install {} ({}): {}",
                entry,
                output.status,
                stderr.trim()
            );
        }
    }
    Ok(entries.len())
}
