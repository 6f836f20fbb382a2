use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::{Paths, paths};
use crate::repo::descriptors;

/// Top-level configuration loaded from `config.toml`.
///
/// Example TOML:
/// ```toml
/// workdir = "~/repo-updater/repos"
///
/// [[groups]]
/// owner = "dataset-ninja"
/// repos = [
///     "https://github.com/dataset-ninja/pascal-voc-2012",
///     "coco-2017",
/// ]
///
/// [script]
/// interpreter = "python3"
///
/// [forces]
/// texts = ["readme"]
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub groups: Vec<RepoGroup>,
    #[serde(default)]
    pub script: ScriptSettings,
    #[serde(default)]
    pub dependencies: DependencySettings,
    #[serde(default)]
    pub git: GitSettings,
    #[serde(default)]
    pub forces: ForceDefaults,
}

/// Repositories belonging to one owner.
///
/// Entries are either full remote URLs or bare repository names, which are
/// expanded to `https://github.com/<owner>/<name>`.
#[derive(Debug, Deserialize, Clone)]
pub struct RepoGroup {
    pub owner: String,
    #[serde(default)]
    pub repos: Vec<String>,
}

/// How the per-repository update script is invoked.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScriptSettings {
    pub interpreter: String,
    /// Script path, relative to the checkout root.
    pub path: PathBuf,
    /// Transient directories removed from the checkout before staging.
    pub cleanup: Vec<PathBuf>,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            interpreter: "python".to_string(),
            path: PathBuf::from("src").join("main.py"),
            cleanup: vec![PathBuf::from("src").join("__pycache__")],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DependencySettings {
    pub manifest: PathBuf,
    /// Program and leading arguments; each manifest entry is appended.
    pub installer: Vec<String>,
    /// Entries containing any of these substrings are never installed.
    pub exclude: Vec<String>,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("requirements.txt"),
            installer: vec!["pip3".to_string(), "install".to_string()],
            exclude: vec!["supervisely".to_string(), "dataset-tools".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GitSettings {
    /// Private key used for clone and push. The SSH agent is used when unset.
    pub ssh_key: Option<PathBuf>,
    pub ssh_host: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            ssh_key: None,
            ssh_host: "git@github.com".to_string(),
        }
    }
}

/// Force selections applied when the CLI does not override them.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct ForceDefaults {
    pub stats: Vec<String>,
    pub visuals: Vec<String>,
    pub texts: Vec<String>,
    pub download_sly_url: bool,
    pub demo: bool,
}

impl Config {
    /// Directory that receives the per-repository checkouts.
    pub fn workdir(&self, p: &Paths) -> PathBuf {
        self.workdir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| p.repos.clone())
    }

    pub fn ssh_key(&self) -> Option<PathBuf> {
        self.git.ssh_key.as_deref().map(expand_tilde)
    }
}

/// Load and parse `config.toml`.
///
/// Uses `path` when given, otherwise the default location from [`paths()`].
///
/// # Errors
/// - Returns an error if the file cannot be read; the message includes the path.
/// - Returns an error if parsing the TOML fails.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => paths()?.config,
    };
    let txt = fs::read_to_string(&path)
        .with_context(|| format!("config not found: {}", path.display()))?;
    parse_config(&txt).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_config(txt: &str) -> Result<Config> {
    Ok(toml::from_str(txt)?)
}

fn expand_tilde(p: &Path) -> PathBuf {
    if let Ok(rest) = p.strip_prefix("~")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    p.to_path_buf()
}

/// CLI command: print the configured repositories with their run index.
///
/// Example output:
/// ```text
///   1  dataset-ninja/pascal-voc-2012  https://github.com/dataset-ninja/pascal-voc-2012
///   2  dataset-ninja/coco-2017        https://github.com/dataset-ninja/coco-2017
/// ```
///
/// # Errors
/// - Returns an error if `config.toml` cannot be loaded or parsed.
pub fn cmd_list(config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let repos = descriptors(&cfg.groups);
    if repos.is_empty() {
        eprintln!("no repositories configured");
        return Ok(());
    }
    let width = repos
        .iter()
        .map(|r| r.display().len())
        .max()
        .unwrap_or_default();
    for (i, r) in repos.iter().enumerate() {
        println!("{:>3}  {:<width$}  {}", i + 1, r.display(), r.url);
    }
    Ok(())
}
