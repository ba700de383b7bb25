//! Plan operations for the Orchestrator.

use log::{error, info, warn};
use uuid::Uuid;

use super::Orchestrator;
use crate::{
    error::{DeployError, Result},
    models::{Plan, PlanStatus},
    params::{Id, RegisterPlan, UpdatePlanSource},
    reconciler::STATE_FILE,
    runner::{InitMode, ValidationResult},
    store::{validate_relative_path, FileSet},
};

impl Orchestrator {
    /// Registers a plan and uploads its files as version 1.
    ///
    /// The plan becomes `generated` once every file is stored, or `failed`
    /// if the upload breaks off. The new source is validated afterwards; a
    /// validation that cannot run leaves the plan unvalidated.
    pub async fn register_plan(&self, params: &RegisterPlan) -> Result<Plan> {
        check_source_files(&params.files)?;

        let user_id = params.user_id.clone();
        let plan = self.with_db(move |db| db.create_plan(&user_id)).await?;
        info!("Registered plan {} under {}", plan.id, plan.storage_prefix);

        if let Err(e) = self.gateway.upload(&plan.storage_prefix, &params.files).await {
            error!("Upload of plan {} failed: {e}", plan.id);
            self.set_plan_status(&plan.id, PlanStatus::Failed).await?;
            return Err(e.into());
        }
        self.set_plan_status(&plan.id, PlanStatus::Generated).await?;

        self.revalidate(&plan.id).await
    }

    /// Uploads new source as the plan's next version.
    ///
    /// The files land under a fresh `v{n+1}/` prefix; earlier versions are
    /// never touched, so a deployment accepted before the edit keeps reading
    /// its own version. The state file of the current version is carried
    /// into the new one. If the upload fails the plan stays on its current
    /// version. Rejected with `DeployError::Conflict` while a deployment of
    /// the plan is in flight.
    pub async fn update_plan_source(&self, params: &UpdatePlanSource) -> Result<Plan> {
        check_source_files(&params.files)?;

        let plan_id = params.plan_id.clone();
        let revision = self
            .with_db(move |db| db.begin_plan_revision(&plan_id))
            .await?;
        let (previous, plan) = (&revision.previous, &revision.plan);

        let mut files = params.files.clone();
        let stored = async {
            // A reserved prefix is reused after a failed upload
            self.gateway.clear(&plan.storage_prefix).await?;
            if self
                .reconciler
                .carry_forward(&previous.storage_prefix, &mut files)
                .await?
            {
                info!("Carried state of plan {} into v{}", plan.id, plan.version);
            }
            self.gateway.upload(&plan.storage_prefix, &files).await?;
            Ok::<(), DeployError>(())
        }
        .await;

        if let Err(e) = stored {
            error!("Revision v{} of plan {} failed: {e}", plan.version, plan.id);
            let abandoned = revision.clone();
            match self
                .with_db(move |db| db.abandon_plan_revision(&abandoned))
                .await
            {
                Ok(restored) => info!(
                    "Plan {} stays at v{} ({})",
                    restored.id,
                    restored.version,
                    restored.status.as_str()
                ),
                Err(restore_err) => error!(
                    "Failed to restore plan {} to v{}: {restore_err}",
                    plan.id, previous.version
                ),
            }
            return Err(e);
        }
        self.set_plan_status(&plan.id, PlanStatus::Generated).await?;
        info!("Plan {} now at {}", plan.id, plan.storage_prefix);

        self.revalidate(&plan.id).await
    }

    /// Runs `terraform validate` against the plan's current source and
    /// records the outcome on the plan.
    pub async fn validate_plan(&self, params: &Id) -> Result<ValidationResult> {
        let plan = self.require_plan(&params.id).await?;
        if plan.status != PlanStatus::Generated {
            return Err(DeployError::PlanNotReady {
                id: plan.id,
                status: plan.status.as_str().to_string(),
            });
        }

        let files = self.gateway.download_all(&plan.storage_prefix).await?;
        let result = self.validate_source(&files).await?;

        let (plan_id, version, recorded) = (plan.id.clone(), plan.version, result.clone());
        let current = self
            .with_db(move |db| db.set_plan_validation(&plan_id, version, &recorded))
            .await?;
        if !current {
            warn!(
                "Plan {} moved past v{} during validation; result not recorded",
                plan.id, plan.version
            );
        }
        Ok(result)
    }

    /// Validates a file set in a throwaway sandbox.
    ///
    /// Runs `terraform init -backend=false` followed by `terraform validate`.
    /// Invalid configuration, including a failing init, is reported as
    /// `valid == false`.
    pub async fn validate_source(&self, files: &FileSet) -> Result<ValidationResult> {
        if !files.has_terraform_source() {
            return Ok(ValidationResult {
                valid: false,
                diagnostics: "No Terraform configuration files found".to_string(),
            });
        }

        let source: FileSet = files
            .iter()
            .filter(|(path, _)| *path != STATE_FILE)
            .map(|(path, content)| (path.to_string(), content.to_vec()))
            .collect();

        let sandbox = self
            .sandboxes
            .acquire(&format!("validate-{}", Uuid::new_v4().simple()))
            .await?;
        sandbox.materialize(&source).await?;

        let no_env = Default::default();
        let init = self.runner.init(&sandbox, InitMode::NoBackend, &no_env).await?;
        let result = if init.succeeded {
            self.runner.validate(&sandbox, &no_env).await?
        } else {
            ValidationResult {
                valid: false,
                diagnostics: init.output,
            }
        };

        if let Err(e) = sandbox.release().await {
            warn!("Failed to release validation sandbox: {e}");
        }
        Ok(result)
    }

    /// Retrieves a plan by its ID.
    pub async fn get_plan(&self, params: &Id) -> Result<Option<Plan>> {
        let plan_id = params.id.clone();
        self.with_db(move |db| db.get_plan(&plan_id)).await
    }

    /// Lists plans, newest first, optionally only those of one user.
    pub async fn list_plans(&self, user_id: Option<String>) -> Result<Vec<Plan>> {
        self.with_db(move |db| db.list_plans(user_id.as_deref()))
            .await
    }

    pub(crate) async fn require_plan(&self, plan_id: &str) -> Result<Plan> {
        self.get_plan(&Id::from(plan_id))
            .await?
            .ok_or_else(|| DeployError::PlanNotFound {
                id: plan_id.to_string(),
            })
    }

    async fn set_plan_status(&self, plan_id: &str, status: PlanStatus) -> Result<()> {
        let plan_id = plan_id.to_string();
        self.with_db(move |db| db.set_plan_status(&plan_id, status))
            .await
    }

    /// Validates the current version and returns the refreshed plan.
    async fn revalidate(&self, plan_id: &str) -> Result<Plan> {
        if let Err(e) = self.validate_plan(&Id::from(plan_id)).await {
            warn!("Validation of plan {plan_id} could not run: {e}");
        }
        self.require_plan(plan_id).await
    }
}

fn check_source_files(files: &FileSet) -> Result<()> {
    if !files.has_terraform_source() {
        return Err(DeployError::invalid_input("files")
            .with_reason("At least one .tf or .tf.json file is required"));
    }
    for path in files.paths() {
        validate_relative_path(path)
            .map_err(|e| DeployError::invalid_input("files").with_reason(e.to_string()))?;
        if path == STATE_FILE {
            return Err(DeployError::invalid_input("files")
                .with_reason(format!("{STATE_FILE} is managed by stratum")));
        }
    }
    Ok(())
}
