//! Plan CRUD operations and queries.

use jiff::Timestamp;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::utils::{enum_column, timestamp_column};
use crate::{
    error::{DatabaseResultExt, DeployError, Result},
    models::{Plan, PlanRevision, PlanStatus},
    runner::ValidationResult,
};

const PLAN_COLUMNS: &str = "id, user_id, storage_prefix, version, status, validation_passed, validation_output, created_at, updated_at";

const INSERT_PLAN_SQL: &str = "INSERT INTO plans (id, user_id, storage_prefix, version, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const UPDATE_PLAN_STATUS_SQL: &str = "UPDATE plans SET status = ?1, updated_at = ?2 WHERE id = ?3";
const UPDATE_PLAN_VALIDATION_SQL: &str = "UPDATE plans SET validation_passed = ?1, validation_output = ?2, updated_at = ?3 WHERE id = ?4 AND version = ?5";
const UPDATE_PLAN_REVISION_SQL: &str = "UPDATE plans SET version = ?1, storage_prefix = ?2, status = ?3, validation_passed = NULL, validation_output = NULL, updated_at = ?4 WHERE id = ?5 AND version = ?6";
const RESTORE_PLAN_REVISION_SQL: &str = "UPDATE plans SET version = ?1, storage_prefix = ?2, status = ?3, validation_passed = ?4, validation_output = ?5, updated_at = ?6 WHERE id = ?7 AND version = ?8";
const SELECT_IN_FLIGHT_FOR_PLAN_SQL: &str = "SELECT id FROM deployments WHERE plan_id = ?1 AND status IN ('started', 'running') LIMIT 1";

impl super::Database {
    /// Helper function to construct a Plan from a database row
    fn build_plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<Plan> {
        let validation_passed: Option<bool> = row.get(5)?;
        let validation_output: Option<String> = row.get(6)?;
        let validation = validation_passed.map(|valid| ValidationResult {
            valid,
            diagnostics: validation_output.unwrap_or_default(),
        });

        Ok(Plan {
            id: row.get(0)?,
            user_id: row.get(1)?,
            storage_prefix: row.get(2)?,
            version: row.get(3)?,
            status: enum_column(row, 4)?,
            validation,
            created_at: timestamp_column(row, 7)?,
            updated_at: timestamp_column(row, 8)?,
        })
    }

    pub(super) fn select_plan(conn: &rusqlite::Connection, id: &str) -> Result<Option<Plan>> {
        conn.query_row(
            &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?1"),
            params![id],
            Self::build_plan_from_row,
        )
        .optional()
        .db_context("Failed to query plan")
    }

    /// Creates a plan at version 1 in status `generating`.
    pub fn create_plan(&mut self, user_id: &str) -> Result<Plan> {
        if user_id.trim().is_empty() {
            return Err(DeployError::invalid_input("user_id").with_reason("User id cannot be empty"));
        }
        if user_id.contains('/') {
            return Err(DeployError::invalid_input("user_id")
                .with_reason("User id cannot contain '/'"));
        }

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now();
        let now_str = now.to_string();
        let id = Uuid::new_v4().to_string();
        let storage_prefix = Plan::prefix_for(user_id, &id, 1);

        tx.execute(
            INSERT_PLAN_SQL,
            params![
                &id,
                user_id,
                &storage_prefix,
                1u32,
                PlanStatus::Generating.as_str(),
                &now_str,
                &now_str
            ],
        )
        .db_context("Failed to insert plan")?;

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Plan {
            id,
            user_id: user_id.to_string(),
            storage_prefix,
            version: 1,
            status: PlanStatus::Generating,
            validation: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Retrieves a plan by its ID.
    pub fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        Self::select_plan(&self.connection, id)
    }

    /// Lists plans, newest first, optionally only those of one user.
    pub fn list_plans(&self, user_id: Option<&str>) -> Result<Vec<Plan>> {
        let mut query = format!("SELECT {PLAN_COLUMNS} FROM plans");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(user_id) = user_id {
            query.push_str(" WHERE user_id = ?");
            params_vec.push(Box::new(user_id.to_string()));
        }
        query.push_str(" ORDER BY rowid DESC");

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| &**b).collect();

        let plans = stmt
            .query_map(&params_refs[..], Self::build_plan_from_row)
            .db_context("Failed to query plans")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to collect plans")?;

        Ok(plans)
    }

    /// Sets a plan's lifecycle status.
    pub fn set_plan_status(&mut self, id: &str, status: PlanStatus) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let rows = tx
            .execute(
                UPDATE_PLAN_STATUS_SQL,
                params![status.as_str(), Timestamp::now().to_string(), id],
            )
            .db_context("Failed to update plan status")?;
        if rows == 0 {
            return Err(DeployError::PlanNotFound { id: id.to_string() });
        }

        tx.commit().db_context("Failed to commit transaction")
    }

    /// Records the validation outcome of `version`. Returns `false` when the
    /// plan has since moved to another version and the result was dropped.
    pub fn set_plan_validation(
        &mut self,
        id: &str,
        version: u32,
        result: &ValidationResult,
    ) -> Result<bool> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        if Self::select_plan(&tx, id)?.is_none() {
            return Err(DeployError::PlanNotFound { id: id.to_string() });
        }

        let rows = tx
            .execute(
                UPDATE_PLAN_VALIDATION_SQL,
                params![
                    result.valid,
                    &result.diagnostics,
                    Timestamp::now().to_string(),
                    id,
                    version
                ],
            )
            .db_context("Failed to record validation")?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(rows > 0)
    }

    /// Moves a plan to its next source version.
    ///
    /// The plan goes back to `generating` under the new prefix, which keeps
    /// new deployments and concurrent edits out until the new files are
    /// uploaded. Rejected while a deployment of the plan is in flight or
    /// while another revision is still being uploaded.
    pub fn begin_plan_revision(&mut self, id: &str) -> Result<PlanRevision> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let plan = Self::select_plan(&tx, id)?
            .ok_or_else(|| DeployError::PlanNotFound { id: id.to_string() })?;

        if plan.status == PlanStatus::Generating {
            return Err(DeployError::PlanNotReady {
                id: plan.id,
                status: plan.status.as_str().to_string(),
            });
        }

        let in_flight: Option<String> = tx
            .query_row(SELECT_IN_FLIGHT_FOR_PLAN_SQL, params![id], |row| row.get(0))
            .optional()
            .db_context("Failed to check in-flight deployments")?;
        if let Some(deployment_id) = in_flight {
            return Err(DeployError::Conflict {
                plan_id: plan.id,
                deployment_id,
            });
        }

        let now = Timestamp::now();
        let version = plan.version + 1;
        let storage_prefix = Plan::prefix_for(&plan.user_id, &plan.id, version);

        tx.execute(
            UPDATE_PLAN_REVISION_SQL,
            params![
                version,
                &storage_prefix,
                PlanStatus::Generating.as_str(),
                now.to_string(),
                id,
                plan.version
            ],
        )
        .db_context("Failed to advance plan version")?;

        tx.commit().db_context("Failed to commit transaction")?;

        let revised = Plan {
            version,
            storage_prefix,
            status: PlanStatus::Generating,
            validation: None,
            updated_at: now,
            ..plan.clone()
        };
        Ok(PlanRevision {
            previous: plan,
            plan: revised,
        })
    }

    /// Puts a plan back on the version it had before a revision whose
    /// upload failed.
    ///
    /// Version, prefix, status and validation return to their previous
    /// values, so deployments and the next edit keep using the last version
    /// that was fully stored. Does nothing if the plan already left the
    /// reserved version.
    pub fn abandon_plan_revision(&mut self, revision: &PlanRevision) -> Result<Plan> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let previous = &revision.previous;
        let validation = previous.validation.as_ref();
        tx.execute(
            RESTORE_PLAN_REVISION_SQL,
            params![
                previous.version,
                &previous.storage_prefix,
                previous.status.as_str(),
                validation.map(|v| v.valid),
                validation.map(|v| v.diagnostics.as_str()),
                Timestamp::now().to_string(),
                &previous.id,
                revision.plan.version
            ],
        )
        .db_context("Failed to restore plan version")?;

        let plan = Self::select_plan(&tx, &previous.id)?.ok_or_else(|| {
            DeployError::PlanNotFound {
                id: previous.id.clone(),
            }
        })?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(plan)
    }
}
