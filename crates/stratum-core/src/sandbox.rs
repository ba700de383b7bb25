//! Isolated working directories for Terraform executions.
//!
//! Every execution gets its own directory under the sandbox root, named after
//! the deployment (or validation) it serves. A [`Sandbox`] removes its
//! directory when released, and its `Drop` impl removes it on every other
//! exit path.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs;

use crate::{
    error::{DeployError, Result},
    store::{validate_relative_path, FileSet},
};

/// Allocates sandboxes below a root directory.
#[derive(Debug, Clone)]
pub struct SandboxManager {
    root: PathBuf,
}

impl SandboxManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding all sandboxes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a sandbox named `name` occupies.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Creates an empty sandbox directory named `name`.
    ///
    /// A leftover directory with the same name is removed first so a stale
    /// state file from an earlier run can never leak into this one.
    pub async fn acquire(&self, name: &str) -> Result<Sandbox> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(DeployError::invalid_input("sandbox")
                .with_reason(format!("'{name}' is not a valid sandbox name")));
        }

        let path = self.path_for(name);
        match fs::remove_dir_all(&path).await {
            Ok(()) => warn!("Removed stale sandbox {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DeployError::file_system(&path, e)),
        }

        fs::create_dir_all(&path)
            .await
            .map_err(|e| DeployError::file_system(&path, e))?;
        debug!("Acquired sandbox {}", path.display());

        Ok(Sandbox {
            path,
            released: false,
        })
    }
}

/// An exclusively owned working directory.
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    released: bool,
}

impl Sandbox {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes every file of `files` below the sandbox, creating intermediate
    /// directories. Returns the number of files written.
    pub async fn materialize(&self, files: &FileSet) -> Result<usize> {
        for (relative, content) in files.iter() {
            validate_relative_path(relative)?;
            let target = self.path.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DeployError::file_system(parent, e))?;
            }
            fs::write(&target, content)
                .await
                .map_err(|e| DeployError::file_system(&target, e))?;
        }
        Ok(files.len())
    }

    /// Reads a file from the sandbox, `None` when it does not exist.
    pub async fn read_file(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        validate_relative_path(relative)?;
        let target = self.path.join(relative);
        match fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeployError::file_system(&target, e)),
        }
    }

    /// Removes a file from the sandbox if present.
    pub async fn remove_file(&self, relative: &str) -> Result<()> {
        validate_relative_path(relative)?;
        let target = self.path.join(relative);
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::file_system(&target, e)),
        }
    }

    /// Removes the sandbox directory and everything in it.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!("Released sandbox {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::file_system(&self.path, e)),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed sandbox {} on drop", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove sandbox {}: {e}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_materialize_preserves_subdirectories() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = SandboxManager::new(temp_dir.path());
        let sandbox = manager.acquire("d-1").await.expect("Failed to acquire");

        let files = FileSet::new()
            .with_file("main.tf", "terraform {}")
            .with_file("modules/net/main.tf", "variable \"cidr\" {}");
        assert_eq!(sandbox.materialize(&files).await.unwrap(), 2);

        let nested = std::fs::read_to_string(sandbox.path().join("modules/net/main.tf")).unwrap();
        assert_eq!(nested, "variable \"cidr\" {}");
    }

    #[tokio::test]
    async fn test_acquire_removes_stale_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = SandboxManager::new(temp_dir.path());
        let stale = manager.path_for("d-1");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("terraform.tfstate"), "{}").unwrap();

        let sandbox = manager.acquire("d-1").await.unwrap();
        assert_eq!(sandbox.read_file("terraform.tfstate").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_release_and_drop_remove_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = SandboxManager::new(temp_dir.path());

        let sandbox = manager.acquire("released").await.unwrap();
        let path = sandbox.path().to_path_buf();
        sandbox.release().await.unwrap();
        assert!(!path.exists());

        let sandbox = manager.acquire("dropped").await.unwrap();
        let path = sandbox.path().to_path_buf();
        drop(sandbox);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_names_and_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = SandboxManager::new(temp_dir.path());
        assert!(manager.acquire("../outside").await.is_err());
        assert!(manager.acquire("").await.is_err());

        let sandbox = manager.acquire("d-2").await.unwrap();
        let files = FileSet::new().with_file("/etc/passwd", "x");
        assert!(matches!(
            sandbox.materialize(&files).await,
            Err(DeployError::Storage(_))
        ));
    }
}
