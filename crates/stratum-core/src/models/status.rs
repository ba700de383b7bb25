//! Status enumerations for plans and deployments.
//!
//! [`DeploymentStatus`] doubles as the deployment state machine: it knows
//! which statuses are terminal and which transitions are legal for a given
//! [`Operation`]. Persisting a transition is the job of the database layer,
//! which uses these rules inside conditional updates.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a plan's source bundle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Source is being produced or uploaded
    #[default]
    Generating,

    /// Source is stored and can be executed
    Generated,

    /// Source could not be produced or stored
    Failed,
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generating" => Ok(PlanStatus::Generating),
            "generated" => Ok(PlanStatus::Generated),
            "failed" => Ok(PlanStatus::Failed),
            _ => Err(format!("Invalid plan status: {s}")),
        }
    }
}

impl PlanStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Generating => "generating",
            PlanStatus::Generated => "generated",
            PlanStatus::Failed => "failed",
        }
    }
}

/// Kind of Terraform execution a deployment performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Apply,
    Destroy,
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "apply" => Ok(Operation::Apply),
            "destroy" => Ok(Operation::Destroy),
            _ => Err(format!("Invalid operation: {s}")),
        }
    }
}

impl Operation {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Apply => "apply",
            Operation::Destroy => "destroy",
        }
    }

    /// Terminal status recorded when the operation succeeds.
    pub fn success_status(&self) -> DeploymentStatus {
        match self {
            Operation::Apply => DeploymentStatus::Success,
            Operation::Destroy => DeploymentStatus::Destroyed,
        }
    }

    /// Terminal status recorded when the operation fails for any reason.
    pub fn failure_status(&self) -> DeploymentStatus {
        match self {
            Operation::Apply => DeploymentStatus::Failed,
            Operation::Destroy => DeploymentStatus::DestroyFailed,
        }
    }
}

/// Type-safe enumeration of deployment statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Accepted; no I/O has happened yet
    Started,

    /// Sandbox is materialized and Terraform is executing
    Running,

    /// Apply finished successfully
    Success,

    /// Apply failed
    Failed,

    /// Destroy finished successfully
    Destroyed,

    /// Destroy failed
    DestroyFailed,
}

/// Statuses that count as in flight for the per-plan exclusion rule.
pub const IN_FLIGHT_STATUSES: [DeploymentStatus; 2] =
    [DeploymentStatus::Started, DeploymentStatus::Running];

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "started" => Ok(DeploymentStatus::Started),
            "running" => Ok(DeploymentStatus::Running),
            "success" => Ok(DeploymentStatus::Success),
            "failed" => Ok(DeploymentStatus::Failed),
            "destroyed" => Ok(DeploymentStatus::Destroyed),
            "destroy_failed" | "destroyfailed" => Ok(DeploymentStatus::DestroyFailed),
            _ => Err(format!("Invalid deployment status: {s}")),
        }
    }
}

impl DeploymentStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Started => "started",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Destroyed => "destroyed",
            DeploymentStatus::DestroyFailed => "destroy_failed",
        }
    }

    /// Whether the status can never change again.
    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    /// Whether the deployment still holds its plan's execution slot.
    pub fn is_in_flight(&self) -> bool {
        IN_FLIGHT_STATUSES.contains(self)
    }

    /// Whether a deployment of `operation` may move from `self` to `next`.
    ///
    /// `started` may skip `running` when the execution fails before
    /// Terraform starts (for example on a storage failure).
    pub fn can_transition_to(&self, next: DeploymentStatus, operation: Operation) -> bool {
        let terminal_for_operation =
            next == operation.success_status() || next == operation.failure_status();

        match self {
            DeploymentStatus::Started => next == DeploymentStatus::Running || terminal_for_operation,
            DeploymentStatus::Running => terminal_for_operation,
            _ => false,
        }
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// ```rust
    /// use stratum_core::models::DeploymentStatus;
    ///
    /// assert_eq!(DeploymentStatus::Success.with_icon(), "✓ Success");
    /// assert_eq!(DeploymentStatus::Running.with_icon(), "➤ Running");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            DeploymentStatus::Started => "○ Started",
            DeploymentStatus::Running => "➤ Running",
            DeploymentStatus::Success => "✓ Success",
            DeploymentStatus::Failed => "✗ Failed",
            DeploymentStatus::Destroyed => "✓ Destroyed",
            DeploymentStatus::DestroyFailed => "✗ Destroy failed",
        }
    }
}
