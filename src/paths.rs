use anyhow::{Result, anyhow};
use std::{env, path::PathBuf};

/// Well-known locations under the repo-updater home directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config: PathBuf,
    pub repos: PathBuf,
    pub stop_file: PathBuf,
}

/// Resolve the repo-updater home directory.
///
/// `$XDG_CONFIG_HOME/repo-updater`, falling back to `$HOME/.config/repo-updater`.
pub fn updater_home() -> Result<PathBuf> {
    let base = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(xdg) => PathBuf::from(xdg),
        None => {
            let home = env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(base.join("repo-updater"))
}

pub fn paths() -> Result<Paths> {
    let home = updater_home()?;
    Ok(Paths {
        config: home.join("config.toml"),
        repos: home.join("repos"),
        stop_file: home.join("stop"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn home_prefers_xdg_config_home() {
        let td = tempfile::tempdir().unwrap();
        let prev = env::var_os("XDG_CONFIG_HOME");
        unsafe { env::set_var("XDG_CONFIG_HOME", td.path()) };

        let p = paths().unwrap();
        assert_eq!(p.config, td.path().join("repo-updater").join("config.toml"));
        assert_eq!(p.repos, td.path().join("repo-updater").join("repos"));
        assert_eq!(p.stop_file, td.path().join("repo-updater").join("stop"));

        match prev {
            Some(v) => unsafe { env::set_var("XDG_CONFIG_HOME", v) },
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
    }

    #[test]
    #[serial]
    fn home_falls_back_to_dot_config() {
        let prev = env::var_os("XDG_CONFIG_HOME");
        unsafe { env::remove_var("XDG_CONFIG_HOME") };

        let home = updater_home().unwrap();
        assert!(home.ends_with(".config/repo-updater"));

        if let Some(v) = prev {
            unsafe { env::set_var("XDG_CONFIG_HOME", v) };
        }
    }
}
