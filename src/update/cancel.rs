use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop signal for a run.
///
/// The driver polls it between repositories only; a stop never interrupts the
/// repository in flight. Besides [`cancel`](Self::cancel), a token may watch a
/// stop file so another process (`repo-updater stop`) can request a halt.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    stop_file: Option<Arc<PathBuf>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips when `path` appears.
    ///
    /// A stop file left over from an earlier run is removed.
    pub fn with_stop_file(path: &Path) -> Result<Self> {
        clear_stop_file(path)?;
        Ok(Self {
            flag: Arc::default(),
            stop_file: Some(Arc::new(path.to_path_buf())),
        })
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        if self.stop_file.as_deref().is_some_and(|p| p.exists()) {
            self.cancel();
            return true;
        }
        false
    }

    /// Remove the watched stop file, if any.
    pub fn release(&self) -> Result<()> {
        match self.stop_file.as_deref() {
            Some(p) => clear_stop_file(p),
            None => Ok(()),
        }
    }
}

fn clear_stop_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Create the stop file watched by a running updater.
pub fn request_stop(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"").with_context(|| format!("failed to write {}", path.display()))
}
