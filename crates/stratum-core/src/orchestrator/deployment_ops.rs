//! Deployment entrypoints and status queries for the Orchestrator.

use log::{error, info, warn};

use super::Orchestrator;
use crate::{
    credentials::Connection,
    error::{DeployError, Result},
    models::{Deployment, DeploymentFilter, Operation},
    params::{Id, RunApply, RunDestroy},
};

/// Error message recorded on deployments failed by [`Orchestrator::recover_interrupted`].
pub const INTERRUPTED_MESSAGE: &str =
    "Interrupted: the process running this deployment stopped before it finished";

impl Orchestrator {
    /// Accepts an apply of the plan and starts it in the background.
    ///
    /// Returns the new deployment's ID as soon as the `started` record is
    /// written. Poll [`Orchestrator::get_deployment`] or call
    /// [`Orchestrator::wait`] for the outcome.
    ///
    /// # Errors
    ///
    /// - `DeployError::Conflict` if a deployment of the plan is in flight
    /// - `DeployError::PlanNotFound` / `DeployError::PlanNotReady` if the
    ///   plan cannot be executed
    pub async fn run_apply(&self, params: &RunApply) -> Result<String> {
        self.accept(&params.plan_id, params.connection.clone(), Operation::Apply)
            .await
    }

    /// Accepts a destroy of the plan's resources and starts it in the
    /// background. Same contract as [`Orchestrator::run_apply`].
    pub async fn run_destroy(&self, params: &RunDestroy) -> Result<String> {
        self.accept(&params.plan_id, params.connection.clone(), Operation::Destroy)
            .await
    }

    async fn accept(
        &self,
        plan_id: &str,
        connection: Connection,
        operation: Operation,
    ) -> Result<String> {
        let (plan_id_owned, connection_id) = (plan_id.to_string(), connection.id.clone());
        let deployment = self
            .with_db(move |db| db.create_deployment(&plan_id_owned, &connection_id, operation))
            .await?;

        let id = deployment.id.clone();
        info!(
            "Accepted {} deployment {id} of plan {plan_id} ({})",
            operation.as_str(),
            deployment.storage_prefix
        );

        // Hold the lock across the spawn so the handle is registered before
        // the task can look for it.
        let mut tasks = self.tasks();
        let this = self.clone();
        let handle = tokio::spawn(async move { this.execute(deployment, connection).await });
        tasks.insert(id.clone(), handle);

        Ok(id)
    }

    /// Waits for the background execution of a deployment started by this
    /// orchestrator, then returns the deployment.
    ///
    /// For a deployment this orchestrator is not running, returns its
    /// current record immediately.
    pub async fn wait(&self, deployment_id: &str) -> Result<Deployment> {
        let handle = self.tasks().remove(deployment_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Execution task of deployment {deployment_id} ended abnormally: {e}");
            }
        }

        self.get_deployment(&Id::from(deployment_id))
            .await?
            .ok_or_else(|| DeployError::DeploymentNotFound {
                id: deployment_id.to_string(),
            })
    }

    /// Retrieves a deployment by its ID.
    pub async fn get_deployment(&self, params: &Id) -> Result<Option<Deployment>> {
        let id = params.id.clone();
        self.with_db(move |db| db.get_deployment(&id)).await
    }

    /// Lists deployments matching `filter`, newest first.
    pub async fn list_deployments(&self, filter: DeploymentFilter) -> Result<Vec<Deployment>> {
        self.with_db(move |db| db.list_deployments(&filter)).await
    }

    /// Fails every in-flight deployment that is not executing in this
    /// process, for records a crashed process left in `started` or
    /// `running`. Only call it when no other process can own in-flight
    /// work. Returns the IDs that were failed.
    pub async fn recover_interrupted(&self) -> Result<Vec<String>> {
        let owned: Vec<String> = self.tasks().keys().cloned().collect();
        let failed = self
            .with_db(move |db| db.fail_in_flight(INTERRUPTED_MESSAGE, &owned))
            .await?;

        for id in &failed {
            warn!("Marked interrupted deployment {id} as failed");
        }
        Ok(failed)
    }

    /// Whether this orchestrator is still executing the deployment.
    pub fn is_executing(&self, deployment_id: &str) -> bool {
        self.tasks()
            .get(deployment_id)
            .is_some_and(|handle| !handle.is_finished())
    }
}
