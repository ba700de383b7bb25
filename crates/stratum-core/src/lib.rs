//! Core library for the Stratum Terraform deployment manager.
//!
//! Stratum stores versioned bundles of Terraform source ("plans") in an
//! object store and executes `apply` and `destroy` against them in isolated
//! sandboxes. It keeps each plan's `terraform.tfstate` in the object store
//! between executions, and records every deployment attempt in SQLite.
//!
//! # Layers
//!
//! - [`store`]: object store trait, filesystem and in-memory backends, and
//!   the gateway that moves whole prefixes in and out of it
//! - [`sandbox`]: per-execution scratch directories
//! - [`runner`]: invokes the Terraform binary and captures its output
//! - [`reconciler`]: moves state between the sandbox and the store
//! - [`db`]: plan and deployment records, including the status machine
//! - [`orchestrator`]: the public API sequencing all of the above
//! - [`display`]: markdown formatting for the CLI
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stratum_core::{params::RegisterPlan, store::FileSet, OrchestratorBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = OrchestratorBuilder::new()
//!     .with_database_path(Some("stratum.db"))
//!     .with_store_dir(Some("objects"))
//!     .build()
//!     .await?;
//!
//! let plan = orchestrator
//!     .register_plan(&RegisterPlan {
//!         user_id: "alice".to_string(),
//!         files: FileSet::new().with_file("main.tf", "terraform {}"),
//!     })
//!     .await?;
//! println!("{plan}");
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod db;
pub mod display;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod params;
pub mod reconciler;
pub mod runner;
pub mod sandbox;
pub mod store;

// Re-export commonly used types
pub use credentials::{Connection, CredentialResolver, EnvCredentialResolver};
pub use db::Database;
pub use error::{DeployError, Result};
pub use models::{Deployment, DeploymentFilter, DeploymentStatus, Operation, Plan, PlanStatus};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use params::{Id, RegisterPlan, RunApply, RunDestroy, UpdatePlanSource};
pub use store::FileSet;
