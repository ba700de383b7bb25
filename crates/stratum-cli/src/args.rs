use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{DeployArgs, ListDeploymentsArgs, PlanCommands, ShowDeploymentArgs};

/// Command-line interface for Stratum, a Terraform deployment manager
///
/// Stratum keeps versioned Terraform source ("plans") in an object store,
/// runs `apply` and `destroy` against them in throwaway sandboxes, and keeps
/// each plan's state file next to its source between runs. Every run is
/// recorded as a deployment with its captured output.
#[derive(Parser)]
#[command(version, about, name = "stratum")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/stratum/stratum.db
    #[arg(long, global = true, env = "STRATUM_DATABASE_FILE")]
    pub database_file: Option<PathBuf>,

    /// Root directory of the object store. Defaults to
    /// $XDG_DATA_HOME/stratum/objects
    #[arg(long, global = true, env = "STRATUM_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Directory under which execution sandboxes are created. Defaults to
    /// the system temp directory
    #[arg(long, global = true, env = "STRATUM_SANDBOX_DIR")]
    pub sandbox_dir: Option<PathBuf>,

    /// Terraform binary to run. Defaults to `terraform` on PATH
    #[arg(long, global = true, env = "STRATUM_TERRAFORM_BIN")]
    pub terraform_bin: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the Stratum CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Register, edit, validate, and inspect plans
    #[command(alias = "p")]
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Apply a plan and wait for the outcome
    Apply(DeployArgs),
    /// Destroy a plan's resources and wait for the outcome
    Destroy(DeployArgs),
    /// Show one deployment with its captured output
    #[command(alias = "s")]
    Status(ShowDeploymentArgs),
    /// List deployments, newest first
    #[command(aliases = ["d", "ls"])]
    Deployments(ListDeploymentsArgs),
    /// Fail deployments left in flight by a process that stopped
    Recover,
}
