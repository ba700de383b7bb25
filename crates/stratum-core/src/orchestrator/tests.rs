use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::{
    credentials::Connection,
    db::Database,
    models::{DeploymentStatus, Operation, PlanStatus},
    params::{Id, RegisterPlan, RunApply, RunDestroy, UpdatePlanSource},
    store::{
        FileSet, MemoryObjectStore, ObjectLookup, ObjectMetadata, ObjectStore, ObjectSummary,
        StorageError,
    },
};

/// Memory store whose listings panic once armed.
struct PanickingStore {
    inner: MemoryObjectStore,
    armed: AtomicBool,
}

#[async_trait]
impl ObjectStore for PanickingStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> std::result::Result<(), StorageError> {
        self.inner.put_object(key, body, metadata).await
    }

    async fn get_object(&self, key: &str) -> ObjectLookup {
        self.inner.get_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> std::result::Result<Vec<ObjectSummary>, StorageError> {
        if self.armed.load(Ordering::SeqCst) {
            panic!("listing {prefix} blew up");
        }
        self.inner.list_objects(prefix).await
    }

    async fn delete_object(&self, key: &str) -> std::result::Result<(), StorageError> {
        self.inner.delete_object(key).await
    }
}

async fn create_test_orchestrator() -> (Orchestrator, Arc<MemoryObjectStore>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(MemoryObjectStore::new());
    let orchestrator = OrchestratorBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_store(store.clone())
        .with_sandbox_root(Some(temp_dir.path().join("sandboxes")))
        .with_terraform_binary(Some(temp_dir.path().join("missing-terraform")))
        .build()
        .await
        .expect("Failed to build orchestrator");
    (orchestrator, store, temp_dir)
}

fn source() -> FileSet {
    FileSet::new().with_file("main.tf", "resource \"null_resource\" \"a\" {}")
}

async fn register(orchestrator: &Orchestrator) -> crate::models::Plan {
    orchestrator
        .register_plan(&RegisterPlan {
            user_id: "alice".to_string(),
            files: source(),
        })
        .await
        .expect("Failed to register plan")
}

#[tokio::test]
async fn test_register_plan_stores_version_one() {
    let (orchestrator, store, _temp_dir) = create_test_orchestrator().await;
    let plan = register(&orchestrator).await;

    assert_eq!(plan.version, 1);
    assert_eq!(plan.status, PlanStatus::Generated);
    assert_eq!(plan.storage_prefix, format!("alice/{}/v1/", plan.id));
    // Validation could not run without a terraform binary
    assert!(plan.validation.is_none());
    assert_eq!(store.keys(), vec![format!("alice/{}/v1/main.tf", plan.id)]);
}

#[tokio::test]
async fn test_register_plan_rejects_bad_input() {
    let (orchestrator, store, _temp_dir) = create_test_orchestrator().await;

    let no_terraform = orchestrator
        .register_plan(&RegisterPlan {
            user_id: "alice".to_string(),
            files: FileSet::new().with_file("README.md", "hello"),
        })
        .await;
    assert!(matches!(no_terraform, Err(DeployError::InvalidInput { .. })));

    let with_state = orchestrator
        .register_plan(&RegisterPlan {
            user_id: "alice".to_string(),
            files: source().with_file("terraform.tfstate", "{}"),
        })
        .await;
    assert!(matches!(with_state, Err(DeployError::InvalidInput { .. })));

    let escaping = orchestrator
        .register_plan(&RegisterPlan {
            user_id: "alice".to_string(),
            files: source().with_file("../x.tf", ""),
        })
        .await;
    assert!(matches!(escaping, Err(DeployError::InvalidInput { .. })));

    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_register_plan_marks_failed_upload() {
    let (orchestrator, store, _temp_dir) = create_test_orchestrator().await;
    store.set_online(false);

    let result = orchestrator
        .register_plan(&RegisterPlan {
            user_id: "alice".to_string(),
            files: source(),
        })
        .await;
    assert!(matches!(result, Err(DeployError::Storage(_))));

    let plans = orchestrator.list_plans(Some("alice".to_string())).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].status, PlanStatus::Failed);
}

#[tokio::test]
async fn test_missing_terraform_binary_fails_deployment() {
    let (orchestrator, _store, _temp_dir) = create_test_orchestrator().await;
    let plan = register(&orchestrator).await;

    let id = orchestrator
        .run_apply(&RunApply {
            plan_id: plan.id.clone(),
            connection: Connection::new("conn-1"),
        })
        .await
        .expect("Apply should be accepted");
    let deployment = orchestrator.wait(&id).await.unwrap();

    assert_eq!(deployment.status, DeploymentStatus::Failed);
    let message = deployment.error_message.unwrap();
    assert!(message.starts_with("Terraform unavailable:"), "{message}");
    assert!(deployment.completed_at.is_some());
    assert!(!orchestrator.sandbox_root().join(&id).exists());
}

#[tokio::test]
async fn test_unreachable_store_fails_destroy_as_storage_failure() {
    let (orchestrator, store, _temp_dir) = create_test_orchestrator().await;
    let plan = register(&orchestrator).await;
    store.set_online(false);

    let id = orchestrator
        .run_destroy(&RunDestroy {
            plan_id: plan.id.clone(),
            connection: Connection::new("conn-1"),
        })
        .await
        .unwrap();
    let deployment = orchestrator.wait(&id).await.unwrap();

    assert_eq!(deployment.status, DeploymentStatus::DestroyFailed);
    assert!(deployment
        .error_message
        .unwrap()
        .starts_with("Storage failure:"));
    assert!(!orchestrator.sandbox_root().join(&id).exists());
}

#[tokio::test]
async fn test_unknown_plan_is_rejected() {
    let (orchestrator, _store, _temp_dir) = create_test_orchestrator().await;
    let result = orchestrator
        .run_apply(&RunApply {
            plan_id: "nope".to_string(),
            connection: Connection::new("conn-1"),
        })
        .await;
    assert!(matches!(result, Err(DeployError::PlanNotFound { .. })));
}

#[tokio::test]
async fn test_recover_interrupted_fails_orphaned_records() {
    let (orchestrator, _store, _temp_dir) = create_test_orchestrator().await;
    let plan = register(&orchestrator).await;

    // A record left behind by a process that died mid-execution
    let db_path = orchestrator.database_path().to_path_buf();
    let plan_id = plan.id.clone();
    let orphan = tokio::task::spawn_blocking(move || {
        let mut db = Database::new(&db_path)?;
        let deployment = db.create_deployment(&plan_id, "conn-1", Operation::Destroy)?;
        db.mark_running(&deployment.id)
    })
    .await
    .unwrap()
    .unwrap();

    let failed = orchestrator.recover_interrupted().await.unwrap();
    assert_eq!(failed, vec![orphan.id.clone()]);

    let recovered = orchestrator
        .get_deployment(&Id::from(orphan.id.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recovered.status, DeploymentStatus::DestroyFailed);
    assert!(recovered.error_message.unwrap().starts_with("Interrupted"));

    // The plan accepts new work again
    assert!(orchestrator.recover_interrupted().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_creates_new_version_and_keeps_old_files() {
    let (orchestrator, store, _temp_dir) = create_test_orchestrator().await;
    let plan = register(&orchestrator).await;

    let edited = orchestrator
        .update_plan_source(&UpdatePlanSource {
            plan_id: plan.id.clone(),
            files: FileSet::new().with_file("main.tf", "resource \"null_resource\" \"b\" {}"),
        })
        .await
        .expect("Failed to edit plan");

    assert_eq!(edited.version, 2);
    assert_eq!(edited.status, PlanStatus::Generated);
    assert_eq!(edited.storage_prefix, format!("alice/{}/v2/", plan.id));
    let keys = store.keys();
    assert!(keys.contains(&format!("alice/{}/v1/main.tf", plan.id)));
    assert!(keys.contains(&format!("alice/{}/v2/main.tf", plan.id)));
}

#[tokio::test]
async fn test_wait_for_unknown_deployment() {
    let (orchestrator, _store, _temp_dir) = create_test_orchestrator().await;
    assert!(matches!(
        orchestrator.wait("missing").await,
        Err(DeployError::DeploymentNotFound { .. })
    ));
}

#[tokio::test]
async fn test_panic_during_execution_fails_deployment() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(PanickingStore {
        inner: MemoryObjectStore::new(),
        armed: AtomicBool::new(false),
    });
    let orchestrator = OrchestratorBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_store(store.clone())
        .with_sandbox_root(Some(temp_dir.path().join("sandboxes")))
        .with_terraform_binary(Some(temp_dir.path().join("missing-terraform")))
        .build()
        .await
        .expect("Failed to build orchestrator");
    let plan = register(&orchestrator).await;
    store.armed.store(true, Ordering::SeqCst);

    let id = orchestrator
        .run_apply(&RunApply {
            plan_id: plan.id.clone(),
            connection: Connection::new("conn-1"),
        })
        .await
        .expect("Apply should be accepted");
    let deployment = orchestrator.wait(&id).await.unwrap();

    assert_eq!(deployment.status, DeploymentStatus::Failed);
    let message = deployment.error_message.unwrap();
    assert!(message.starts_with("Unexpected error: panic"), "{message}");
    assert!(message.contains("blew up"), "{message}");
    assert!(deployment.completed_at.is_some());
    assert!(!orchestrator.sandbox_root().join(&id).exists());
    assert!(!orchestrator.is_executing(&id));
}
