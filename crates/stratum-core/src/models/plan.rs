//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::PlanStatus;
use crate::runner::ValidationResult;

/// A versioned bundle of Terraform source stored under a storage prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Unique identifier for the plan
    pub id: String,

    /// Identifier of the owning user
    pub user_id: String,

    /// Prefix under which the current version's files live,
    /// `{user_id}/{id}/v{version}/`
    pub storage_prefix: String,

    /// Current source version (starts at 1)
    pub version: u32,

    /// Lifecycle status of the source bundle
    #[serde(default)]
    pub status: PlanStatus,

    /// Outcome of the last `terraform validate` on the current version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,

    /// Timestamp when the plan was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the plan was last modified (UTC)
    pub updated_at: Timestamp,
}

impl Plan {
    /// Builds the storage prefix for a plan version.
    ///
    /// ```rust
    /// use stratum_core::models::Plan;
    ///
    /// assert_eq!(Plan::prefix_for("alice", "p-1", 3), "alice/p-1/v3/");
    /// ```
    pub fn prefix_for(user_id: &str, plan_id: &str, version: u32) -> String {
        format!("{user_id}/{plan_id}/v{version}/")
    }
}

/// A source revision in progress: the plan as it was before the edit, and
/// the plan with the reserved next version.
///
/// `previous` holds the last version whose files were fully stored, which is
/// where the plan's state lives and where it returns if the upload fails.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRevision {
    pub previous: Plan,
    pub plan: Plan,
}
