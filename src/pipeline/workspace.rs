//! Per-run work directory
//!
//! Page images live in a directory owned by one run. The directory is
//! removed by [`RunWorkspace::cleanup`] or, on early exit and cancellation,
//! when the guard is dropped. A dropped guard removes the directory on the
//! blocking pool. Removal failures are logged only.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub struct RunWorkspace {
    path: PathBuf,
    removed: bool,
}

impl RunWorkspace {
    /// Create a fresh directory below `root`
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("ocr-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it
    ///
    /// Returns `false` if removal failed.
    pub async fn cleanup(mut self) -> bool {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Failed to remove temporary page images at {}: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || remove_quietly(&path));
            }
            Err(_) => remove_quietly(&path),
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                "Failed to remove temporary page images at {}: {}",
                path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cleanup_removes_directory() {
        let root = TempDir::new().unwrap();
        let workspace = RunWorkspace::create(root.path()).await.unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("page-1.png"), "x").unwrap();

        assert!(workspace.cleanup().await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let workspace = RunWorkspace::create(root.path()).await.unwrap();
            std::fs::create_dir(workspace.path().join("1-pdftoppm")).unwrap();
            workspace.path().to_path_buf()
        };

        for _ in 0..50 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_outside_runtime_removes_directory() {
        let root = TempDir::new().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let workspace = runtime.block_on(RunWorkspace::create(root.path())).unwrap();
        let path = workspace.path().to_path_buf();
        drop(runtime);

        drop(workspace);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_of_vanished_directory_reports_failure() {
        let root = TempDir::new().unwrap();
        let workspace = RunWorkspace::create(root.path()).await.unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();

        assert!(!workspace.cleanup().await);
    }
}
