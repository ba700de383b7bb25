//! Builder for creating and configuring Orchestrator instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use tokio::task;

use super::Orchestrator;
use crate::{
    db::Database,
    error::{DeployError, Result},
    runner::TerraformRunner,
    sandbox::SandboxManager,
    store::{FsObjectStore, ObjectStore, ObjectStoreGateway},
};

const APP_NAME: &str = "stratum";
const DEFAULT_TERRAFORM_BINARY: &str = "terraform";

/// Builder for creating and configuring Orchestrator instances.
#[derive(Clone, Default)]
pub struct OrchestratorBuilder {
    database_path: Option<PathBuf>,
    store: Option<Arc<dyn ObjectStore>>,
    store_dir: Option<PathBuf>,
    sandbox_root: Option<PathBuf>,
    terraform_binary: Option<PathBuf>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/stratum/stratum.db` or
    /// `~/.local/share/stratum/stratum.db`
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses `store` as the object store, overriding any store directory.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the root of the filesystem object store.
    ///
    /// If not specified, uses `$XDG_DATA_HOME/stratum/objects`.
    pub fn with_store_dir<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.store_dir = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets the directory under which sandboxes are created.
    ///
    /// If not specified, uses `stratum-sandboxes` in the system temp
    /// directory.
    pub fn with_sandbox_root<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.sandbox_root = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets the Terraform binary. Defaults to `terraform` on `PATH`.
    pub fn with_terraform_binary<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.terraform_binary = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Builds the configured orchestrator instance.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::FileSystem` if a directory cannot be created
    /// Returns `DeployError::Database` if database initialization fails
    /// Returns `DeployError::Storage` if the object store cannot be opened
    pub async fn build(self) -> Result<Orchestrator> {
        let db_path = match self.database_path {
            Some(path) => path,
            None => Self::default_database_path()?,
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DeployError::file_system(parent, e))?;
        }

        let db_path_clone = db_path.clone();
        task::spawn_blocking(move || {
            let _db = Database::new(&db_path_clone)?;
            Ok::<(), DeployError>(())
        })
        .await
        .map_err(DeployError::join)??;

        let store: Arc<dyn ObjectStore> = match self.store {
            Some(store) => store,
            None => {
                let dir = match self.store_dir {
                    Some(dir) => dir,
                    None => Self::default_store_dir()?,
                };
                Arc::new(FsObjectStore::open(dir)?)
            }
        };

        let sandbox_root = self
            .sandbox_root
            .unwrap_or_else(|| std::env::temp_dir().join(format!("{APP_NAME}-sandboxes")));
        std::fs::create_dir_all(&sandbox_root)
            .map_err(|e| DeployError::file_system(&sandbox_root, e))?;

        let terraform = self
            .terraform_binary
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TERRAFORM_BINARY));

        debug!(
            "Orchestrator ready: database={}, sandboxes={}, terraform={}",
            db_path.display(),
            sandbox_root.display(),
            terraform.display()
        );

        Ok(Orchestrator::new(
            db_path,
            ObjectStoreGateway::new(store),
            SandboxManager::new(sandbox_root),
            TerraformRunner::new(terraform),
        ))
    }

    /// Returns the default database path following XDG Base Directory
    /// specification.
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix(APP_NAME)
            .place_data_file("stratum.db")
            .map_err(|e| DeployError::XdgDirectory(e.to_string()))
    }

    fn default_store_dir() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix(APP_NAME)
            .create_data_directory("objects")
            .map_err(|e| DeployError::XdgDirectory(e.to_string()))
    }
}
