//! Parameter structures for orchestrator operations.
//!
//! These are plain structures without framework derives. The CLI builds them
//! from its clap arguments through `From` conversions, so the core never
//! depends on an interface crate.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │   CLI Args      │    │  Core Params    │
//! │  (clap derives) │───▶│ (minimal deps)  │
//! └─────────────────┘    └─────────────────┘
//! ```

use crate::{credentials::Connection, store::FileSet};

/// Parameters for operations addressing a single record by ID.
#[derive(Debug, Clone, Default)]
pub struct Id {
    pub id: String,
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

/// Register a new plan from its source files.
#[derive(Debug, Clone, Default)]
pub struct RegisterPlan {
    /// Owning user; becomes the first segment of the storage prefix
    pub user_id: String,
    /// Relative path → content
    pub files: FileSet,
}

/// Replace a plan's source with a new version.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlanSource {
    pub plan_id: String,
    pub files: FileSet,
}

/// Apply a plan with resolved credentials.
#[derive(Debug, Clone)]
pub struct RunApply {
    pub plan_id: String,
    pub connection: Connection,
}

/// Destroy whatever a plan created, with resolved credentials.
#[derive(Debug, Clone)]
pub struct RunDestroy {
    pub plan_id: String,
    pub connection: Connection,
}
