//! Terraform state reconciliation between sandboxes and the object store.
//!
//! The state artifact of a plan version is the object named
//! [`STATE_FILE`] at the version's storage prefix. Its presence means
//! resources exist for that version.
//!
//! - after a successful apply the sandbox's state is uploaded back
//!   ([`StateReconciler::persist_state_after_apply`]); a failed upload never
//!   fails the deployment but is surfaced as an orphan risk
//! - before a destroy the downloaded state is placed in the sandbox
//!   ([`StateReconciler::hydrate_state_before_destroy`]); no state means
//!   nothing to destroy
//! - after a successful destroy the state object is retired
//! - a source edit carries the current state into the new version prefix

use log::{error, info, warn};

use crate::{
    error::Result,
    sandbox::Sandbox,
    store::{normalize_prefix, FileSet, ObjectLookup, ObjectStoreGateway, StorageError},
};

/// Name of the Terraform state file, in sandboxes and in the store.
pub const STATE_FILE: &str = "terraform.tfstate";

/// Outcome of uploading state after an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePersistence {
    /// State uploaded to the plan's prefix
    Persisted { bytes: usize },
    /// Terraform wrote no state file
    NoStateProduced,
    /// Upload failed; the store does not reflect what was created
    PersistFailed {
        reason: String,
        resources_may_be_orphaned: bool,
    },
}

impl StatePersistence {
    /// Warning text to record on the deployment, if any.
    pub fn warning(&self) -> Option<String> {
        match self {
            StatePersistence::PersistFailed {
                reason,
                resources_may_be_orphaned: true,
            } => Some(format!(
                "State upload failed, resources may be orphaned: {reason}"
            )),
            StatePersistence::PersistFailed { reason, .. } => {
                Some(format!("State upload failed: {reason}"))
            }
            _ => None,
        }
    }
}

/// Outcome of preparing the sandbox for a destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateHydration {
    /// State file is in place
    Hydrated { bytes: usize },
    /// No state exists for the plan version
    NothingToDestroy,
}

/// Moves state between sandboxes and the object store.
#[derive(Clone)]
pub struct StateReconciler {
    gateway: ObjectStoreGateway,
}

impl StateReconciler {
    pub fn new(gateway: ObjectStoreGateway) -> Self {
        Self { gateway }
    }

    /// Uploads the sandbox's state file to `prefix`. Never fails: problems
    /// are reported through the returned [`StatePersistence`].
    pub async fn persist_state_after_apply(
        &self,
        sandbox: &Sandbox,
        prefix: &str,
        deployment_id: &str,
    ) -> StatePersistence {
        let bytes = match sandbox.read_file(STATE_FILE).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("Deployment {deployment_id} produced no state file");
                return StatePersistence::NoStateProduced;
            }
            Err(e) => return self.persist_failed(deployment_id, prefix, e.to_string()),
        };

        let size = bytes.len();
        let files = FileSet::new().with_file(STATE_FILE, bytes);
        match self.gateway.upload(prefix, &files).await {
            Ok(()) => {
                info!("Persisted {size} bytes of state for deployment {deployment_id}");
                StatePersistence::Persisted { bytes: size }
            }
            Err(e) => self.persist_failed(deployment_id, prefix, e.to_string()),
        }
    }

    fn persist_failed(&self, deployment_id: &str, prefix: &str, reason: String) -> StatePersistence {
        error!(
            "ORPHAN-RISK deployment={deployment_id} prefix={} state upload failed: {reason}",
            normalize_prefix(prefix)
        );
        StatePersistence::PersistFailed {
            reason,
            resources_may_be_orphaned: true,
        }
    }

    /// Ensures the sandbox holds exactly the state found in `files`.
    pub async fn hydrate_state_before_destroy(
        &self,
        sandbox: &Sandbox,
        files: &FileSet,
    ) -> Result<StateHydration> {
        match files.get(STATE_FILE) {
            Some(state) => {
                if sandbox.read_file(STATE_FILE).await?.as_deref() != Some(state) {
                    let only_state = FileSet::new().with_file(STATE_FILE, state);
                    sandbox.materialize(&only_state).await?;
                }
                Ok(StateHydration::Hydrated { bytes: state.len() })
            }
            None => {
                sandbox.remove_file(STATE_FILE).await?;
                Ok(StateHydration::NothingToDestroy)
            }
        }
    }

    /// Removes the state object after a successful destroy. Returns a
    /// warning when the object could not be removed.
    pub async fn retire_state_after_destroy(&self, prefix: &str) -> Option<String> {
        match self.gateway.remove(prefix, STATE_FILE).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to retire state under {prefix}: {e}");
                Some(format!("Destroyed, but the stale state object remains: {e}"))
            }
        }
    }

    /// Copies the state object of `from_prefix` into `files` unless the file
    /// set already carries one. Returns whether state was added.
    pub async fn carry_forward(&self, from_prefix: &str, files: &mut FileSet) -> Result<bool> {
        if files.contains(STATE_FILE) {
            return Ok(false);
        }

        match self.gateway.lookup(from_prefix, STATE_FILE).await {
            ObjectLookup::Found(bytes) => {
                files.insert(STATE_FILE, bytes);
                Ok(true)
            }
            ObjectLookup::Empty => Ok(false),
            ObjectLookup::StoreUnavailable(reason) => Err(StorageError::Download {
                key: format!("{}{STATE_FILE}", normalize_prefix(from_prefix)),
                reason,
            }
            .into()),
        }
    }
}
