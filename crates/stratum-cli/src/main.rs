//! Stratum CLI Application
//!
//! Command-line interface for registering Terraform plans and running
//! deployments against them.

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use stratum_core::{models::Operation, OrchestratorBuilder};
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        store_dir,
        sandbox_dir,
        terraform_bin,
        no_color,
        command,
    } = Args::parse();

    let orchestrator = OrchestratorBuilder::new()
        .with_database_path(database_file)
        .with_store_dir(store_dir)
        .with_sandbox_root(sandbox_dir)
        .with_terraform_binary(terraform_bin)
        .build()
        .await
        .context("Failed to initialize orchestrator")?;

    let cli = Cli::new(orchestrator, TerminalRenderer::new(!no_color));

    info!("Stratum started");

    match command {
        Plan { command } => cli.handle_plan_command(command).await,
        Apply(args) => cli.handle_deploy(args, Operation::Apply).await,
        Destroy(args) => cli.handle_deploy(args, Operation::Destroy).await,
        Status(args) => cli.show_deployment(args).await,
        Deployments(args) => cli.list_deployments(args).await,
        Recover => cli.recover().await,
    }
}
