#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::Duration,
};

use stratum_core::{
    models::{Deployment, DeploymentStatus, Plan},
    params::{Id, RegisterPlan},
    store::{FileSet, MemoryObjectStore},
    Orchestrator, OrchestratorBuilder,
};
use tempfile::TempDir;

/// Stand-in for the Terraform binary.
///
/// Counts `resource "` lines across `*.tf` files and keeps that count in
/// `terraform.tfstate`. Markers in the source change its behavior:
/// `SYNTAX_ERROR` breaks init, `INVALID` breaks validate, `FAIL_APPLY` makes
/// apply fail after writing partial state, `FAIL_DESTROY` makes destroy fail.
/// When `STUB_GATE` names an existing file, apply waits until it is removed.
const STUB_TERRAFORM: &str = r#"#!/bin/sh
has() { cat ./*.tf 2>/dev/null | grep -q "$1"; }
count=$(cat ./*.tf 2>/dev/null | grep -c '^resource "')

case "$1" in
  init)
    if has SYNTAX_ERROR; then
      echo "Error: Invalid block definition" >&2
      exit 1
    fi
    printf '\033[1m\033[32mTerraform has been successfully initialized!\033[0m\n'
    ;;
  validate)
    if has SYNTAX_ERROR || has INVALID; then
      echo "Error: Unsupported argument" >&2
      exit 1
    fi
    echo "Success! The configuration is valid."
    ;;
  plan)
    echo "Plan: $count to add, 0 to change, 0 to destroy."
    : > tfplan
    ;;
  apply)
    if [ ! -f tfplan ]; then
      echo "Error: Failed to load saved plan" >&2
      exit 1
    fi
    if [ -n "$STUB_GATE" ]; then
      while [ -f "$STUB_GATE" ]; do sleep 0.05; done
    fi
    echo "Using region ${AWS_REGION:-none}"
    if has FAIL_APPLY; then
      printf '{"version": 4, "resource_count": 1}\n' > terraform.tfstate
      echo "Error: creating S3 Bucket: AccessDenied" >&2
      exit 1
    fi
    printf '{"version": 4, "resource_count": %s}\n' "$count" > terraform.tfstate
    echo "Apply complete! Resources: $count added, 0 changed, 0 destroyed."
    ;;
  destroy)
    n=0
    if [ -f terraform.tfstate ]; then
      n=$(sed -n 's/.*"resource_count": *\([0-9]*\).*/\1/p' terraform.tfstate)
    fi
    if has FAIL_DESTROY; then
      echo "Error: deleting S3 Bucket: BucketNotEmpty" >&2
      exit 1
    fi
    printf '{"version": 4, "resource_count": 0}\n' > terraform.tfstate
    echo "Destroy complete! Resources: $n destroyed."
    ;;
  *)
    echo "unsupported command $1" >&2
    exit 1
    ;;
esac
"#;

/// Path of the stub binary, written once per test process so no test
/// executes it while another is still writing it.
pub fn stub_terraform() -> &'static Path {
    static STUB: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = STUB.get_or_init(|| {
        let dir = TempDir::new().expect("Failed to create stub dir");
        let path = dir.path().join("terraform");
        fs::write(&path, STUB_TERRAFORM).expect("Failed to write stub");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make stub executable");
        (dir, path)
    });
    path
}

pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: Arc<MemoryObjectStore>,
    pub orchestrator: Orchestrator,
}

/// Helper function to create an orchestrator backed by the stub binary and
/// an in-memory store
pub async fn create_test_orchestrator() -> TestEnv {
    let terraform = stub_terraform();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(MemoryObjectStore::new());
    let orchestrator = OrchestratorBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_store(store.clone())
        .with_sandbox_root(Some(temp_dir.path().join("sandboxes")))
        .with_terraform_binary(Some(terraform))
        .build()
        .await
        .expect("Failed to create orchestrator");
    TestEnv {
        temp_dir,
        store,
        orchestrator,
    }
}

pub fn source(main_tf: &str) -> FileSet {
    FileSet::new().with_file("main.tf", main_tf)
}

pub const TWO_BUCKETS: &str = r#"resource "aws_s3_bucket" "logs" {}
resource "aws_s3_bucket" "assets" {}
"#;

pub async fn register(env: &TestEnv, main_tf: &str) -> Plan {
    env.orchestrator
        .register_plan(&RegisterPlan {
            user_id: "alice".to_string(),
            files: source(main_tf),
        })
        .await
        .expect("Failed to register plan")
}

/// Polls until the deployment reaches `status`.
pub async fn wait_for_status(env: &TestEnv, id: &str, status: DeploymentStatus) -> Deployment {
    for _ in 0..200 {
        let deployment = env
            .orchestrator
            .get_deployment(&Id::from(id))
            .await
            .expect("Failed to get deployment")
            .expect("Deployment should exist");
        if deployment.status == status {
            return deployment;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Deployment {id} never reached {status}");
}
