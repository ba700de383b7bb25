//! High-level API for plans and deployments.
//!
//! The [`Orchestrator`] is the entry point for every operation. It sequences
//! the object store gateway, sandboxes, the Terraform runner, and the state
//! reconciler, and records every step in the database.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   Entrypoints   │    │    Execution    │    │    Database     │
//! │ (plan_ops,      │───▶│ (detached task, │───▶│   (via db/)     │
//! │  deployment_ops)│    │  execution)     │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!   Synchronous accept    Sandbox → runner       Status machine
//! ```
//!
//! ## Submodules
//!
//! - [`builder`]: Factory for creating [`Orchestrator`] instances
//! - [`plan_ops`]: Plan registration, source edits, validation
//! - [`deployment_ops`]: `run_apply`, `run_destroy`, status queries, recovery
//! - `execution`: The background body of a deployment
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use stratum_core::{
//!     credentials::Connection,
//!     params::{RegisterPlan, RunApply},
//!     store::FileSet,
//!     OrchestratorBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = OrchestratorBuilder::new().build().await?;
//!
//! let plan = orchestrator
//!     .register_plan(&RegisterPlan {
//!         user_id: "alice".to_string(),
//!         files: FileSet::new().with_file("main.tf", "resource \"null_resource\" \"a\" {}"),
//!     })
//!     .await?;
//!
//! let deployment_id = orchestrator
//!     .run_apply(&RunApply {
//!         plan_id: plan.id.clone(),
//!         connection: Connection::new("conn-1"),
//!     })
//!     .await?;
//!
//! let deployment = orchestrator.wait(&deployment_id).await?;
//! println!("{deployment}");
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::task::{self, JoinHandle};

use crate::{
    db::Database,
    error::{DeployError, Result},
    reconciler::StateReconciler,
    runner::TerraformRunner,
    sandbox::SandboxManager,
    store::ObjectStoreGateway,
};

pub mod builder;
pub mod deployment_ops;
mod execution;
pub mod plan_ops;

#[cfg(test)]
mod tests;

pub use builder::OrchestratorBuilder;

type TaskMap = HashMap<String, JoinHandle<()>>;

/// Main interface for managing plans and deployments.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) db_path: PathBuf,
    pub(crate) gateway: ObjectStoreGateway,
    pub(crate) sandboxes: SandboxManager,
    pub(crate) runner: TerraformRunner,
    pub(crate) reconciler: StateReconciler,
    tasks: Arc<Mutex<TaskMap>>,
}

impl Orchestrator {
    pub(crate) fn new(
        db_path: PathBuf,
        gateway: ObjectStoreGateway,
        sandboxes: SandboxManager,
        runner: TerraformRunner,
    ) -> Self {
        Self {
            db_path,
            reconciler: StateReconciler::new(gateway.clone()),
            gateway,
            sandboxes,
            runner,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Path of the SQLite database.
    pub fn database_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Root directory holding execution sandboxes.
    pub fn sandbox_root(&self) -> &std::path::Path {
        self.sandboxes.root()
    }

    /// Runs `f` against a fresh database connection on the blocking pool.
    pub(crate) async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            f(&mut db)
        })
        .await
        .map_err(DeployError::join)?
    }

    fn tasks(&self) -> MutexGuard<'_, TaskMap> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
