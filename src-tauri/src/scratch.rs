use crate::error::{HoHatchError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Fixed-count retry with a constant pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds or the attempts are used up; the last error wins.
    pub fn run<T, E, F>(&self, label: &str, mut op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> std::result::Result<T, E>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    log::warn!("{} failed: {}. Retrying... ({}/{})", label, e, attempt, attempts);
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pauses around texconv to ride out file-lock lag on the host OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait after texconv exits before touching its output
    pub settle: Duration,
    /// Reopening a freshly written image
    pub image_io: RetryPolicy,
    /// Removing scratch and temp directories
    pub dir_removal: RetryPolicy,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            image_io: RetryPolicy::new(5, Duration::from_millis(500)),
            dir_removal: RetryPolicy::new(5, Duration::from_millis(100)),
        }
    }
}

impl Timing {
    /// No sleeping at all
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            image_io: RetryPolicy::new(1, Duration::ZERO),
            dir_removal: RetryPolicy::new(1, Duration::ZERO),
        }
    }

    pub fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

/// Remove a directory tree, clearing read-only flags that block deletion
pub fn remove_dir_all_forced(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            clear_readonly(dir);
            fs::remove_dir_all(dir)
        }
        Err(e) => Err(e),
    }
}

fn clear_readonly(dir: &Path) {
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if let Ok(metadata) = entry.metadata() {
            let mut permissions = metadata.permissions();
            if permissions.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                permissions.set_readonly(false);
                let _ = fs::set_permissions(entry.path(), permissions);
            }
        }
    }
}

/// Empty `dir` (retrying on lock errors) and recreate it
pub fn reset_dir(dir: &Path, policy: &RetryPolicy) -> Result<()> {
    if dir.exists() {
        if let Err(e) = policy.run(&format!("Removing {}", dir.display()), || {
            remove_dir_all_forced(dir)
        }) {
            log::warn!("Failed to remove {} after retries: {}", dir.display(), e);
        }
    }
    fs::create_dir_all(dir).map_err(|e| {
        HoHatchError::FileSystem(format!("Failed to create {}: {}", dir.display(), e))
    })
}

/// Move a file by copy-then-delete so it also works across volumes.
/// A leftover source after a successful copy is only logged.
pub fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest).map_err(|e| {
        HoHatchError::FileSystem(format!(
            "Failed to move {} to {}: {}",
            src.display(),
            dest.display(),
            e
        ))
    })?;
    if let Err(e) = fs::remove_file(src) {
        log::warn!("Copied {} but could not remove it: {}", src.display(), e);
    }
    Ok(())
}

/// Per-operation working directory, removed on drop.
///
/// Named `<prefix>_<stem>_<8 hex>` so concurrent or repeated operations on the
/// same texture never share a path.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removal: RetryPolicy,
}

impl ScratchDir {
    pub fn create(parent: &Path, prefix: &str, stem: &str, removal: RetryPolicy) -> Result<Self> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let path = parent.join(format!("{}_{}_{}", prefix, stem, &suffix[..8]));
        reset_dir(&path, &removal)?;
        log::debug!("Prepared scratch directory {}", path.display());
        Ok(Self { path, removal })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let path = self.path.clone();
        let result = self
            .removal
            .run(&format!("Cleaning {}", path.display()), || remove_dir_all_forced(&path));
        if let Err(e) = result {
            log::warn!("Could not remove scratch directory {}: {}", path.display(), e);
        }
    }
}
