//! Background body of a deployment.
//!
//! Everything below [`Orchestrator::execute`] ends in a [`Completion`]:
//! storage failures, Terraform failures, a missing binary, and panics are
//! all turned into a terminal status with captured text. The sandbox is
//! released on every path.

use std::collections::BTreeMap;

use log::{error, info, warn};
use tokio::task::JoinError;

use super::Orchestrator;
use crate::{
    credentials::Connection,
    error::DeployError,
    models::{Completion, Deployment, Operation},
    reconciler::StateHydration,
    runner::{InitMode, ProcessResult, RunnerError},
    sandbox::Sandbox,
};

/// Commands and their output, in execution order.
#[derive(Debug, Default)]
struct Transcript(String);

impl Transcript {
    fn note(&mut self, line: &str) {
        self.0.push_str(line);
        self.0.push('\n');
    }

    fn record(&mut self, command: &str, result: &ProcessResult) {
        self.0.push_str(&format!("$ terraform {command}\n"));
        self.0.push_str(&result.output);
        if !result.output.ends_with('\n') {
            self.0.push('\n');
        }
    }

    fn into_string(self) -> String {
        self.0
    }
}

impl Orchestrator {
    /// Runs a deployment to a terminal status.
    ///
    /// The body runs in its own task so that a panic inside it is observed
    /// here as a `JoinError` and still recorded.
    pub(super) async fn execute(self, deployment: Deployment, connection: Connection) {
        let id = deployment.id.clone();
        let operation = deployment.operation;

        let body = {
            let this = self.clone();
            tokio::spawn(async move { this.execute_body(&deployment, &connection).await })
        };

        let completion = match body.await {
            Ok(completion) => completion,
            Err(e) => {
                let reason = describe_join_error(e);
                error!("Deployment {id} aborted: {reason}");
                Completion::failure(operation, format!("Unexpected error: {reason}"))
            }
        };

        self.record_completion(&id, &completion).await;
        self.tasks().remove(&id);
    }

    async fn record_completion(&self, id: &str, completion: &Completion) {
        let (deployment_id, recorded) = (id.to_string(), completion.clone());
        match self
            .with_db(move |db| db.complete_deployment(&deployment_id, &recorded))
            .await
        {
            Ok(deployment) => info!(
                "Deployment {id} finished: {}",
                deployment.status.as_str()
            ),
            Err(DeployError::TerminalStatus { status, .. }) => warn!(
                "Deployment {id} was already {} before its execution finished",
                status.as_str()
            ),
            Err(e) => error!("Failed to record outcome of deployment {id}: {e}"),
        }
    }

    async fn execute_body(&self, deployment: &Deployment, connection: &Connection) -> Completion {
        let operation = deployment.operation;
        let sandbox = match self.sandboxes.acquire(&deployment.id).await {
            Ok(sandbox) => sandbox,
            Err(e) => return Completion::failure(operation, format!("Sandbox failure: {e}")),
        };

        let completion = self.run_in_sandbox(&sandbox, deployment, connection).await;

        if let Err(e) = sandbox.release().await {
            warn!("Failed to release sandbox of deployment {}: {e}", deployment.id);
        }
        completion
    }

    async fn run_in_sandbox(
        &self,
        sandbox: &Sandbox,
        deployment: &Deployment,
        connection: &Connection,
    ) -> Completion {
        let operation = deployment.operation;
        let prefix = &deployment.storage_prefix;
        let mut transcript = Transcript::default();

        let files = match self.gateway.download_all(prefix).await {
            Ok(files) => files,
            Err(e) => return Completion::failure(operation, format!("Storage failure: {e}")),
        };
        if !files.has_terraform_source() {
            return Completion::failure(
                operation,
                format!("Storage failure: no Terraform source found under {prefix}"),
            );
        }
        if let Err(e) = sandbox.materialize(&files).await {
            return Completion::failure(operation, format!("Sandbox failure: {e}"));
        }

        if operation == Operation::Destroy {
            match self
                .reconciler
                .hydrate_state_before_destroy(sandbox, &files)
                .await
            {
                Ok(StateHydration::Hydrated { bytes }) => {
                    info!("Deployment {} restored {bytes} bytes of state", deployment.id);
                }
                Ok(StateHydration::NothingToDestroy) => {
                    transcript.note("No Terraform state found for this plan; nothing to destroy.");
                }
                Err(e) => return Completion::failure(operation, format!("Sandbox failure: {e}")),
            }
        }

        let deployment_id = deployment.id.clone();
        if let Err(e) = self.with_db(move |db| db.mark_running(&deployment_id)).await {
            return Completion::failure(operation, format!("Unexpected error: {e}"));
        }

        let env = &connection.env;
        let outcome = match operation {
            Operation::Apply => self.apply_steps(sandbox, env, &mut transcript).await,
            Operation::Destroy => self.destroy_steps(sandbox, env, &mut transcript).await,
        };

        let (completion, terraform_ran) = match outcome {
            Ok(None) => (Completion::success(operation, String::new()), true),
            Ok(Some(message)) => (Completion::failure(operation, message), true),
            Err(e) => (
                Completion::failure(operation, format!("Terraform unavailable: {e}")),
                false,
            ),
        };

        let warning = if terraform_ran {
            self.reconcile_state(sandbox, deployment, &completion).await
        } else {
            None
        };
        completion
            .with_output(transcript.into_string())
            .with_state_warning(warning)
    }

    /// `init`, `plan`, `apply`. Returns the failure message, if any.
    async fn apply_steps(
        &self,
        sandbox: &Sandbox,
        env: &BTreeMap<String, String>,
        transcript: &mut Transcript,
    ) -> Result<Option<String>, RunnerError> {
        let init = self.runner.init(sandbox, InitMode::Backend, env).await?;
        transcript.record("init", &init);
        if !init.succeeded {
            return Ok(Some(failure_message("Init", &init)));
        }

        let plan = self.runner.plan(sandbox, env).await?;
        transcript.record("plan", &plan);
        if !plan.succeeded {
            return Ok(Some(failure_message("Plan", &plan)));
        }

        let apply = self.runner.apply(sandbox, env).await?;
        transcript.record("apply", &apply);
        if !apply.succeeded {
            return Ok(Some(failure_message("Apply", &apply)));
        }

        Ok(None)
    }

    /// `init`, `destroy`. Returns the failure message, if any.
    async fn destroy_steps(
        &self,
        sandbox: &Sandbox,
        env: &BTreeMap<String, String>,
        transcript: &mut Transcript,
    ) -> Result<Option<String>, RunnerError> {
        let init = self.runner.init(sandbox, InitMode::Backend, env).await?;
        transcript.record("init", &init);
        if !init.succeeded {
            return Ok(Some(failure_message("Init", &init)));
        }

        let destroy = self.runner.destroy(sandbox, env).await?;
        transcript.record("destroy", &destroy);
        if !destroy.succeeded {
            return Ok(Some(failure_message("Destroy", &destroy)));
        }

        Ok(None)
    }

    /// Brings the stored state in line with the sandbox after Terraform ran.
    ///
    /// A successful destroy retires the state object. Every other outcome
    /// uploads whatever state Terraform left behind, since a failed apply or
    /// destroy may still have changed real resources.
    async fn reconcile_state(
        &self,
        sandbox: &Sandbox,
        deployment: &Deployment,
        completion: &Completion,
    ) -> Option<String> {
        let succeeded = completion.status == deployment.operation.success_status();
        if succeeded && deployment.operation == Operation::Destroy {
            return self
                .reconciler
                .retire_state_after_destroy(&deployment.storage_prefix)
                .await;
        }

        self.reconciler
            .persist_state_after_apply(sandbox, &deployment.storage_prefix, &deployment.id)
            .await
            .warning()
    }
}

fn failure_message(step: &str, result: &ProcessResult) -> String {
    let detail = result.output.trim();
    if detail.is_empty() {
        format!("{step} failed: exit code {:?}", result.exit_code)
    } else {
        format!("{step} failed: {detail}")
    }
}

fn describe_join_error(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with a non-string payload".to_string()
    }
}
