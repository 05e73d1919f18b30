use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-execution directory mounted into the sandbox.
///
/// Removed by [`Workspace::remove`] on the normal path, and on drop as a
/// fallback when an execution unwinds early.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create `{base}/{submission_id}-{random}`. Concurrent executions of the
    /// same submission never share a directory.
    pub async fn create(base: &Path, submission_id: Uuid) -> std::io::Result<Self> {
        let path = base.join(format!("{}-{}", submission_id, Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path).await?;
        open_permissions(&path).await?;
        debug!(path = %path.display(), "Created workspace");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `name` (relative to the workspace root).
    pub async fn write_file(&self, name: &str, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
        let target = self.path.join(name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, contents).await
    }

    /// Directory the sandbox may write into (compiled artifacts).
    pub async fn create_dir(&self, name: &str) -> std::io::Result<()> {
        let dir = self.path.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        open_permissions(&dir).await
    }

    pub async fn remove(mut self) -> std::io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove workspace on drop")
            }
        }
    }
}

/// The sandbox user may differ from the worker user.
#[cfg(unix)]
async fn open_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await
}

#[cfg(not(unix))]
async fn open_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Remove workspace directories under `base` not modified for `max_age`.
/// Leftovers come from a previous process that was killed mid-execution.
pub async fn sweep_stale(base: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(base).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_dir() => m,
            _ => continue,
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to sweep workspace"),
        }
    }

    if removed > 0 {
        info!(removed, base = %base.display(), "Swept stale workspaces");
    }
    Ok(removed)
}
