//! Terraform process runner.
//!
//! Runs `terraform` subcommands inside a [`Sandbox`] and captures their
//! combined output with ANSI escape sequences removed. A nonzero exit is a
//! normal [`ProcessResult`] with `succeeded == false`; only failing to launch
//! the binary at all is a [`RunnerError`].

use std::{collections::BTreeMap, path::PathBuf, process::Stdio};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use crate::sandbox::Sandbox;

mod ansi;

pub use ansi::strip_ansi;

/// File name of the saved plan produced by `terraform plan`.
pub const PLAN_FILE: &str = "tfplan";

/// Failures to launch the Terraform binary.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Terraform binary '{binary}' not found")]
    BinaryMissing { binary: String },
    #[error("Failed to launch '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one Terraform invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    /// Stdout followed by stderr, ANSI sequences stripped
    pub output: String,
}

/// Outcome of `terraform validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub diagnostics: String,
}

/// How `terraform init` treats the configured backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// Full init, backend included
    Backend,
    /// `-backend=false`, used for validation only
    NoBackend,
}

/// Runs Terraform subcommands.
#[derive(Debug, Clone)]
pub struct TerraformRunner {
    binary: PathBuf,
}

impl TerraformRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `terraform init`. Safe to run repeatedly in the same sandbox.
    pub async fn init(
        &self,
        sandbox: &Sandbox,
        mode: InitMode,
        env: &BTreeMap<String, String>,
    ) -> Result<ProcessResult, RunnerError> {
        let mut args = vec!["init", "-no-color", "-input=false"];
        if mode == InitMode::NoBackend {
            args.push("-backend=false");
        }
        self.run(sandbox, &args, env).await
    }

    /// `terraform plan`, saving the plan to [`PLAN_FILE`].
    pub async fn plan(
        &self,
        sandbox: &Sandbox,
        env: &BTreeMap<String, String>,
    ) -> Result<ProcessResult, RunnerError> {
        let out = format!("-out={PLAN_FILE}");
        self.run(sandbox, &["plan", &out, "-no-color", "-input=false"], env)
            .await
    }

    /// `terraform validate`. Invalid configuration is reported in the
    /// result, never as an error.
    pub async fn validate(
        &self,
        sandbox: &Sandbox,
        env: &BTreeMap<String, String>,
    ) -> Result<ValidationResult, RunnerError> {
        let result = self.run(sandbox, &["validate", "-no-color"], env).await?;
        Ok(ValidationResult {
            valid: result.succeeded,
            diagnostics: result.output,
        })
    }

    /// `terraform apply` of the saved plan.
    pub async fn apply(
        &self,
        sandbox: &Sandbox,
        env: &BTreeMap<String, String>,
    ) -> Result<ProcessResult, RunnerError> {
        self.run(
            sandbox,
            &["apply", "-auto-approve", "-no-color", "-input=false", PLAN_FILE],
            env,
        )
        .await
    }

    /// `terraform destroy`.
    pub async fn destroy(
        &self,
        sandbox: &Sandbox,
        env: &BTreeMap<String, String>,
    ) -> Result<ProcessResult, RunnerError> {
        self.run(
            sandbox,
            &["destroy", "-auto-approve", "-no-color", "-input=false"],
            env,
        )
        .await
    }

    async fn run(
        &self,
        sandbox: &Sandbox,
        args: &[&str],
        env: &BTreeMap<String, String>,
    ) -> Result<ProcessResult, RunnerError> {
        let binary = self.binary.display().to_string();
        debug!("Running {binary} {} in {}", args.join(" "), sandbox.path().display());

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(sandbox.path())
            .envs(env)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RunnerError::BinaryMissing {
                    binary: binary.clone(),
                },
                _ => RunnerError::Spawn {
                    binary: binary.clone(),
                    source: e,
                },
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        let result = ProcessResult {
            succeeded: output.status.success(),
            exit_code: output.status.code(),
            output: strip_ansi(&combined).into_owned(),
        };

        if result.succeeded {
            info!("terraform {} succeeded", args[0]);
        } else {
            warn!(
                "terraform {} exited with {:?}",
                args[0], result.exit_code
            );
        }
        Ok(result)
    }
}
