//! Command argument wrappers and their handlers.
//!
//! Each clap argument struct converts into the matching core parameter type,
//! so core types stay free of clap attributes:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Orchestrator
//! ```
//!
//! Arguments that name source files are converted asynchronously, since the
//! files have to be read from disk first.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use log::debug;
use stratum_core::{
    display::{Accepted, Deployments, Notice, Plans, Recovered, Registered, Revised},
    models::{DeploymentFilter, Operation},
    params::{Id, RegisterPlan, RunApply, RunDestroy, UpdatePlanSource},
    store::FileSet,
    CredentialResolver, EnvCredentialResolver, Orchestrator,
};
use tokio::{fs, signal};

use crate::renderer::TerminalRenderer;

/// Register a new plan from local Terraform source
///
/// Each path may be a file or a directory. Directories are read recursively;
/// hidden directories such as `.terraform` and local state files are
/// skipped.
#[derive(Args)]
pub struct RegisterPlanArgs {
    /// Files or directories holding the Terraform source
    #[arg(required = true, help = "Terraform files or directories to upload")]
    pub paths: Vec<PathBuf>,
    /// Owner of the plan
    #[arg(short, long, env = "STRATUM_USER", help = "User that owns the plan")]
    pub user: String,
}

impl RegisterPlanArgs {
    pub async fn into_params(self) -> Result<RegisterPlan> {
        Ok(RegisterPlan {
            user_id: self.user,
            files: load_source(&self.paths).await?,
        })
    }
}

/// Replace a plan's source with a new version
///
/// The new files become the plan's next version; earlier versions stay in
/// the store untouched.
#[derive(Args)]
pub struct EditPlanArgs {
    #[arg(help = "Unique identifier of the plan to edit")]
    pub id: String,
    #[arg(required = true, help = "Terraform files or directories to upload")]
    pub paths: Vec<PathBuf>,
}

impl EditPlanArgs {
    pub async fn into_params(self) -> Result<UpdatePlanSource> {
        Ok(UpdatePlanSource {
            plan_id: self.id,
            files: load_source(&self.paths).await?,
        })
    }
}

/// Show details of a specific plan
#[derive(Args)]
pub struct ShowPlanArgs {
    #[arg(help = "Unique identifier of the plan to show")]
    pub id: String,
}

impl From<ShowPlanArgs> for Id {
    fn from(val: ShowPlanArgs) -> Self {
        Id { id: val.id }
    }
}

/// Run `terraform validate` against a plan's current source
#[derive(Args)]
pub struct ValidatePlanArgs {
    #[arg(help = "Unique identifier of the plan to validate")]
    pub id: String,
}

impl From<ValidatePlanArgs> for Id {
    fn from(val: ValidatePlanArgs) -> Self {
        Id { id: val.id }
    }
}

/// List plans, newest first
#[derive(Args)]
pub struct ListPlansArgs {
    #[arg(short, long, help = "Only list plans owned by this user")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Register a new plan
    #[command(alias = "r")]
    Register(RegisterPlanArgs),
    /// Upload new source as the plan's next version
    #[command(alias = "e")]
    Edit(EditPlanArgs),
    /// Show plan details and its deployments
    #[command(alias = "s")]
    Show(ShowPlanArgs),
    /// Validate the plan's current source
    #[command(alias = "v")]
    Validate(ValidatePlanArgs),
    /// List plans
    #[command(aliases = ["l", "ls"])]
    List(ListPlansArgs),
}

/// Arguments shared by `apply` and `destroy`
#[derive(Args)]
pub struct DeployArgs {
    #[arg(help = "Unique identifier of the plan to execute")]
    pub plan_id: String,
    #[arg(
        short,
        long,
        env = "STRATUM_CONNECTION",
        default_value = "default",
        help = "Cloud connection whose credentials Terraform runs with"
    )]
    pub connection: String,
}

/// Show one deployment
#[derive(Args)]
pub struct ShowDeploymentArgs {
    #[arg(help = "Unique identifier of the deployment to show")]
    pub id: String,
}

impl From<ShowDeploymentArgs> for Id {
    fn from(val: ShowDeploymentArgs) -> Self {
        Id { id: val.id }
    }
}

/// Operation filter for deployment listings
#[derive(Clone, Copy, ValueEnum)]
pub enum OperationArg {
    Apply,
    Destroy,
}

impl From<OperationArg> for Operation {
    fn from(val: OperationArg) -> Self {
        match val {
            OperationArg::Apply => Operation::Apply,
            OperationArg::Destroy => Operation::Destroy,
        }
    }
}

/// List deployments
#[derive(Args)]
pub struct ListDeploymentsArgs {
    #[arg(short, long, help = "Only list deployments of this plan")]
    pub plan: Option<String>,
    #[arg(short, long, help = "Only list deployments of this operation")]
    pub operation: Option<OperationArg>,
    #[arg(long, help = "Only list deployments that have not finished")]
    pub in_flight: bool,
}

impl From<ListDeploymentsArgs> for DeploymentFilter {
    fn from(val: ListDeploymentsArgs) -> Self {
        DeploymentFilter {
            plan_id: val.plan,
            status: None,
            operation: val.operation.map(Into::into),
            in_flight_only: val.in_flight,
        }
    }
}

/// Runs commands against an orchestrator and renders their results.
pub struct Cli {
    orchestrator: Orchestrator,
    renderer: TerminalRenderer,
    resolver: Box<dyn CredentialResolver>,
}

impl Cli {
    pub fn new(orchestrator: Orchestrator, renderer: TerminalRenderer) -> Self {
        Self {
            orchestrator,
            renderer,
            resolver: Box::new(EnvCredentialResolver),
        }
    }

    pub async fn handle_plan_command(&self, command: PlanCommands) -> Result<()> {
        match command {
            PlanCommands::Register(args) => {
                let params = args.into_params().await?;
                let plan = self.orchestrator.register_plan(&params).await?;
                let invalid = plan.validation.as_ref().is_some_and(|v| !v.valid);
                let id = plan.id.clone();
                self.renderer.render(&Registered(plan).to_string())?;
                if invalid {
                    self.renderer.render(
                        &Notice::warning(format!("plan {id} failed validation")).to_string(),
                    )?;
                }
                Ok(())
            }
            PlanCommands::Edit(args) => {
                let params = args.into_params().await?;
                let plan = self.orchestrator.update_plan_source(&params).await?;
                self.renderer.render(&Revised(plan).to_string())
            }
            PlanCommands::Show(args) => {
                let id = Id::from(args);
                let plan = self
                    .orchestrator
                    .get_plan(&id)
                    .await?
                    .ok_or_else(|| anyhow!("Plan with ID {} not found", id.id))?;
                let deployments = self
                    .orchestrator
                    .list_deployments(DeploymentFilter::for_plan(&id.id))
                    .await?;

                let mut output = plan.to_string();
                output.push_str("\n## Deployments\n\n");
                output.push_str(&Deployments(deployments).to_string());
                self.renderer.render(&output)
            }
            PlanCommands::Validate(args) => {
                let id = Id::from(args);
                let result = self.orchestrator.validate_plan(&id).await?;
                self.renderer.render(&result.to_string())?;
                if !result.valid {
                    bail!("Plan {} failed validation", id.id);
                }
                Ok(())
            }
            PlanCommands::List(args) => {
                let plans = self.orchestrator.list_plans(args.user).await?;
                self.renderer.render(&Plans(plans).to_string())
            }
        }
    }

    /// Starts an apply or destroy, waits for it, and fails when the
    /// deployment did not succeed.
    pub async fn handle_deploy(&self, args: DeployArgs, operation: Operation) -> Result<()> {
        if operation == Operation::Apply {
            let plan = self
                .orchestrator
                .get_plan(&Id::from(args.plan_id.as_str()))
                .await?;
            if plan.is_some_and(|p| p.validation.is_some_and(|v| !v.valid)) {
                self.renderer.render(
                    &Notice::warning(format!(
                        "plan {} failed validation; applying anyway",
                        args.plan_id
                    ))
                    .to_string(),
                )?;
            }
        }

        let connection = self.resolver.resolve(&args.connection).await?;
        debug!("Resolved connection {connection:?}");

        let plan_id = args.plan_id;
        let id = match operation {
            Operation::Apply => {
                self.orchestrator
                    .run_apply(&RunApply {
                        plan_id: plan_id.clone(),
                        connection,
                    })
                    .await?
            }
            Operation::Destroy => {
                self.orchestrator
                    .run_destroy(&RunDestroy {
                        plan_id: plan_id.clone(),
                        connection,
                    })
                    .await?
            }
        };
        self.renderer.render(
            &Accepted {
                deployment_id: &id,
                plan_id: &plan_id,
                operation,
            }
            .to_string(),
        )?;

        let deployment = tokio::select! {
            result = self.orchestrator.wait(&id) => result?,
            _ = signal::ctrl_c() => {
                self.renderer.render(
                    &Notice::warning(format!(
                        "stopped waiting; run `stratum recover` to close deployment {id}"
                    ))
                    .to_string(),
                )?;
                bail!("Interrupted while deployment {id} was in flight");
            }
        };

        self.renderer.render(&format!("\n{deployment}"))?;
        if deployment.status != operation.success_status() {
            bail!("Deployment {id} finished with status {}", deployment.status);
        }
        Ok(())
    }

    pub async fn show_deployment(&self, args: ShowDeploymentArgs) -> Result<()> {
        let id = Id::from(args);
        let deployment = self
            .orchestrator
            .get_deployment(&id)
            .await?
            .ok_or_else(|| anyhow!("Deployment with ID {} not found", id.id))?;
        self.renderer.render(&deployment.to_string())
    }

    pub async fn list_deployments(&self, args: ListDeploymentsArgs) -> Result<()> {
        let deployments = self.orchestrator.list_deployments(args.into()).await?;
        self.renderer.render(&Deployments(deployments).to_string())
    }

    pub async fn recover(&self) -> Result<()> {
        let failed = self.orchestrator.recover_interrupted().await?;
        self.renderer.render(&Recovered(failed).to_string())
    }
}

/// Reads `paths` into a file set keyed by relative path.
///
/// Files are keyed by their file name, directories contribute their contents
/// relative to the directory.
async fn load_source(paths: &[PathBuf]) -> Result<FileSet> {
    let mut files = FileSet::new();
    for path in paths {
        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        if metadata.is_dir() {
            collect_dir(path, &mut files).await?;
        } else {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?;
            let content = fs::read(path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;
            files.insert(name, content);
        }
    }
    Ok(files)
}

async fn collect_dir(root: &Path, files: &mut FileSet) -> Result<()> {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Cannot list {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                if !name.starts_with('.') {
                    pending.push(path);
                }
                continue;
            }
            if !file_type.is_file() || is_local_artifact(&name) {
                debug!("Skipping {}", path.display());
                continue;
            }

            let relative = path
                .strip_prefix(root)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = fs::read(&path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;
            files.insert(relative, content);
        }
    }
    Ok(())
}

/// Files Terraform leaves in a working directory that must not be uploaded.
fn is_local_artifact(name: &str) -> bool {
    name.starts_with("terraform.tfstate") || name == "tfplan"
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_load_source_reads_directories_recursively() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.tf"), "terraform {}").unwrap();
        std::fs::create_dir_all(dir.path().join("modules/net")).unwrap();
        std::fs::write(dir.path().join("modules/net/vpc.tf"), "").unwrap();
        std::fs::create_dir_all(dir.path().join(".terraform/providers")).unwrap();
        std::fs::write(dir.path().join(".terraform/providers/bin"), "x").unwrap();
        std::fs::write(dir.path().join("terraform.tfstate"), "{}").unwrap();
        std::fs::write(dir.path().join("terraform.tfstate.backup"), "{}").unwrap();

        let files = load_source(&[dir.path().to_path_buf()]).await.unwrap();
        let paths: Vec<&str> = files.paths().collect();

        assert_eq!(paths, vec!["main.tf", "modules/net/vpc.tf"]);
        assert_eq!(files.get("main.tf"), Some(&b"terraform {}"[..]));
    }

    #[tokio::test]
    async fn test_load_source_keys_files_by_name() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("vars.tfvars");
        std::fs::write(&file, "region = \"eu-west-1\"").unwrap();

        let files = load_source(&[file]).await.unwrap();
        assert!(files.contains("vars.tfvars"));
    }

    #[tokio::test]
    async fn test_load_source_missing_path() {
        let dir = TempDir::new().unwrap();
        let result = load_source(&[dir.path().join("nope")]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_deployment_filter_from_args() {
        let filter = DeploymentFilter::from(ListDeploymentsArgs {
            plan: Some("p-1".to_string()),
            operation: Some(OperationArg::Destroy),
            in_flight: true,
        });
        assert_eq!(filter.plan_id.as_deref(), Some("p-1"));
        assert_eq!(filter.operation, Some(Operation::Destroy));
        assert!(filter.in_flight_only);
        assert!(filter.status.is_none());
    }
}
