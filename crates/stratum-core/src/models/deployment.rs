//! Deployment model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{DeploymentStatus, Operation};

/// A single apply or destroy attempt against a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    /// Unique identifier; also names the execution sandbox
    pub id: String,

    /// ID of the plan being executed
    pub plan_id: String,

    /// ID of the cloud connection whose credentials are used
    pub connection_id: String,

    /// Apply or destroy
    pub operation: Operation,

    /// Storage prefix the execution reads, fixed at acceptance
    pub storage_prefix: String,

    /// Current status
    pub status: DeploymentStatus,

    /// Combined Terraform output captured so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Failure description for terminal failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Set when the state file could not be reconciled with the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_warning: Option<String>,

    /// Timestamp when the deployment was accepted (UTC)
    pub created_at: Timestamp,

    /// Timestamp of the last status change (UTC)
    pub updated_at: Timestamp,

    /// Timestamp when a terminal status was recorded (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Deployment {
    /// Whether the deployment has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Terminal result of an execution, handed to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: DeploymentStatus,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub state_warning: Option<String>,
}

impl Completion {
    /// A successful completion for `operation`.
    pub fn success(operation: Operation, output: impl Into<String>) -> Self {
        Self {
            status: operation.success_status(),
            output: Some(output.into()),
            error_message: None,
            state_warning: None,
        }
    }

    /// A failed completion for `operation` with the given message.
    pub fn failure(operation: Operation, error_message: impl Into<String>) -> Self {
        Self {
            status: operation.failure_status(),
            output: None,
            error_message: Some(error_message.into()),
            state_warning: None,
        }
    }

    /// Attach captured output.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Attach a state reconciliation warning.
    pub fn with_state_warning(mut self, warning: Option<String>) -> Self {
        self.state_warning = warning;
        self
    }
}
