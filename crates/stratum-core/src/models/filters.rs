//! Filter types for querying deployments.

use super::{DeploymentStatus, Operation};

/// Filter options for listing deployments.
#[derive(Debug, Clone, Default)]
pub struct DeploymentFilter {
    /// Only deployments of this plan
    pub plan_id: Option<String>,

    /// Only deployments with this status
    pub status: Option<DeploymentStatus>,

    /// Only deployments of this operation kind
    pub operation: Option<Operation>,

    /// Only deployments that have not reached a terminal status
    pub in_flight_only: bool,
}

impl DeploymentFilter {
    /// Create a filter listing every deployment of a plan.
    ///
    /// ```rust
    /// use stratum_core::models::DeploymentFilter;
    ///
    /// let filter = DeploymentFilter::for_plan("p-1");
    /// assert_eq!(filter.plan_id.as_deref(), Some("p-1"));
    /// assert!(!filter.in_flight_only);
    /// ```
    pub fn for_plan(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: Some(plan_id.into()),
            ..Default::default()
        }
    }

    /// Create a filter matching every in-flight deployment.
    pub fn in_flight() -> Self {
        Self {
            in_flight_only: true,
            ..Default::default()
        }
    }
}
