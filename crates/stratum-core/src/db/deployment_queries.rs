//! Deployment records and the persisted status state machine.

use jiff::Timestamp;
use rusqlite::{params, ErrorCode, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::utils::{enum_column, optional_timestamp_column, timestamp_column, IN_FLIGHT_SQL};
use crate::{
    error::{DatabaseResultExt, DeployError, Result},
    models::{Completion, Deployment, DeploymentFilter, DeploymentStatus, Operation, PlanStatus},
};

const DEPLOYMENT_COLUMNS: &str = "id, plan_id, connection_id, operation, storage_prefix, status, output, error_message, state_warning, created_at, updated_at, completed_at";

const INSERT_DEPLOYMENT_SQL: &str = "INSERT INTO deployments (id, plan_id, connection_id, operation, storage_prefix, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const SELECT_IN_FLIGHT_FOR_PLAN_SQL: &str = "SELECT id FROM deployments WHERE plan_id = ?1 AND status IN ('started', 'running') LIMIT 1";
const UPDATE_STARTED_TO_RUNNING_SQL: &str =
    "UPDATE deployments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4";
const UPDATE_COMPLETION_SQL: &str = "UPDATE deployments SET status = ?1, output = ?2, error_message = ?3, state_warning = ?4, updated_at = ?5, completed_at = ?5 WHERE id = ?6 AND status IN ('started', 'running')";

impl super::Database {
    /// Helper function to construct a Deployment from a database row
    fn build_deployment_from_row(row: &rusqlite::Row) -> rusqlite::Result<Deployment> {
        Ok(Deployment {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            connection_id: row.get(2)?,
            operation: enum_column(row, 3)?,
            storage_prefix: row.get(4)?,
            status: enum_column(row, 5)?,
            output: row.get(6)?,
            error_message: row.get(7)?,
            state_warning: row.get(8)?,
            created_at: timestamp_column(row, 9)?,
            updated_at: timestamp_column(row, 10)?,
            completed_at: optional_timestamp_column(row, 11)?,
        })
    }

    fn select_deployment(conn: &rusqlite::Connection, id: &str) -> Result<Option<Deployment>> {
        conn.query_row(
            &format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE id = ?1"),
            params![id],
            Self::build_deployment_from_row,
        )
        .optional()
        .db_context("Failed to query deployment")
    }

    fn require_deployment(conn: &rusqlite::Connection, id: &str) -> Result<Deployment> {
        Self::select_deployment(conn, id)?
            .ok_or_else(|| DeployError::DeploymentNotFound { id: id.to_string() })
    }

    /// Accepts a new deployment of `plan_id` in status `started`.
    ///
    /// The in-flight check and the insert share one immediate transaction;
    /// the partial unique index on in-flight rows backs it up. The plan's
    /// current storage prefix is captured so later source edits do not
    /// affect this execution.
    pub fn create_deployment(
        &mut self,
        plan_id: &str,
        connection_id: &str,
        operation: Operation,
    ) -> Result<Deployment> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let plan = Self::select_plan(&tx, plan_id)?
            .ok_or_else(|| DeployError::PlanNotFound {
                id: plan_id.to_string(),
            })?;

        if plan.status != PlanStatus::Generated {
            return Err(DeployError::PlanNotReady {
                id: plan.id,
                status: plan.status.as_str().to_string(),
            });
        }

        let in_flight: Option<String> = tx
            .query_row(SELECT_IN_FLIGHT_FOR_PLAN_SQL, params![plan_id], |row| row.get(0))
            .optional()
            .db_context("Failed to check in-flight deployments")?;
        if let Some(deployment_id) = in_flight {
            return Err(DeployError::Conflict {
                plan_id: plan_id.to_string(),
                deployment_id,
            });
        }

        let now = Timestamp::now();
        let now_str = now.to_string();
        let id = Uuid::new_v4().to_string();

        tx.execute(
            INSERT_DEPLOYMENT_SQL,
            params![
                &id,
                plan_id,
                connection_id,
                operation.as_str(),
                &plan.storage_prefix,
                DeploymentStatus::Started.as_str(),
                &now_str,
                &now_str
            ],
        )
        .map_err(|e| Self::insert_error(&tx, plan_id, e))?;

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Deployment {
            id,
            plan_id: plan_id.to_string(),
            connection_id: connection_id.to_string(),
            operation,
            storage_prefix: plan.storage_prefix,
            status: DeploymentStatus::Started,
            output: None,
            error_message: None,
            state_warning: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// Maps a failed deployment insert. A unique-index violation means
    /// another deployment of the plan is in flight; it is looked up so the
    /// conflict names it.
    fn insert_error(
        conn: &rusqlite::Connection,
        plan_id: &str,
        error: rusqlite::Error,
    ) -> DeployError {
        if error.sqlite_error_code() != Some(ErrorCode::ConstraintViolation) {
            return DeployError::database("Failed to insert deployment").with_source(error);
        }

        match conn
            .query_row(SELECT_IN_FLIGHT_FOR_PLAN_SQL, params![plan_id], |row| row.get(0))
            .optional()
        {
            Ok(Some(deployment_id)) => DeployError::Conflict {
                plan_id: plan_id.to_string(),
                deployment_id,
            },
            Ok(None) => DeployError::database("Failed to insert deployment").with_source(error),
            Err(e) => DeployError::database("Failed to look up the in-flight deployment")
                .with_source(e),
        }
    }

    /// Retrieves a deployment by its ID.
    pub fn get_deployment(&self, id: &str) -> Result<Option<Deployment>> {
        Self::select_deployment(&self.connection, id)
    }

    /// Lists deployments matching `filter`, newest first.
    pub fn list_deployments(&self, filter: &DeploymentFilter) -> Result<Vec<Deployment>> {
        let mut query = format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments");
        let mut conditions: Vec<String> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref plan_id) = filter.plan_id {
            conditions.push("plan_id = ?".to_string());
            params_vec.push(Box::new(plan_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            params_vec.push(Box::new(status.as_str().to_string()));
        }
        if let Some(operation) = filter.operation {
            conditions.push("operation = ?".to_string());
            params_vec.push(Box::new(operation.as_str().to_string()));
        }
        if filter.in_flight_only {
            conditions.push(format!("status IN {IN_FLIGHT_SQL}"));
        }

        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY rowid DESC");

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| &**b).collect();

        let deployments = stmt
            .query_map(&params_refs[..], Self::build_deployment_from_row)
            .db_context("Failed to query deployments")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to collect deployments")?;

        Ok(deployments)
    }

    /// Moves a deployment from `started` to `running`.
    ///
    /// Marking an already running deployment is a no-op; a terminal one is
    /// rejected.
    pub fn mark_running(&mut self, id: &str) -> Result<Deployment> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let current = Self::require_deployment(&tx, id)?;
        match current.status {
            DeploymentStatus::Running => return Ok(current),
            status if status.is_terminal() => {
                return Err(DeployError::TerminalStatus {
                    id: id.to_string(),
                    status,
                });
            }
            _ => {}
        }

        tx.execute(
            UPDATE_STARTED_TO_RUNNING_SQL,
            params![
                DeploymentStatus::Running.as_str(),
                Timestamp::now().to_string(),
                id,
                DeploymentStatus::Started.as_str()
            ],
        )
        .db_context("Failed to mark deployment running")?;

        let updated = Self::require_deployment(&tx, id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(updated)
    }

    /// Records the terminal outcome of a deployment, exactly once.
    ///
    /// # Errors
    ///
    /// - `DeployError::TerminalStatus` if the deployment already finished
    /// - `DeployError::InvalidTransition` if `completion.status` is not a
    ///   terminal status of the deployment's operation
    pub fn complete_deployment(&mut self, id: &str, completion: &Completion) -> Result<Deployment> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let current = Self::require_deployment(&tx, id)?;
        if current.is_terminal() {
            return Err(DeployError::TerminalStatus {
                id: id.to_string(),
                status: current.status,
            });
        }
        if !completion.status.is_terminal()
            || !current
                .status
                .can_transition_to(completion.status, current.operation)
        {
            return Err(DeployError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to: completion.status,
            });
        }

        let rows = tx
            .execute(
                UPDATE_COMPLETION_SQL,
                params![
                    completion.status.as_str(),
                    completion.output.as_deref(),
                    completion.error_message.as_deref(),
                    completion.state_warning.as_deref(),
                    Timestamp::now().to_string(),
                    id
                ],
            )
            .db_context("Failed to record deployment completion")?;
        if rows == 0 {
            return Err(DeployError::TerminalStatus {
                id: id.to_string(),
                status: current.status,
            });
        }

        let updated = Self::require_deployment(&tx, id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(updated)
    }

    /// Fails every in-flight deployment except those in `exclude`, with
    /// `reason` as the error message. Returns the IDs that were failed.
    pub fn fail_in_flight(&mut self, reason: &str, exclude: &[String]) -> Result<Vec<String>> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let candidates: Vec<(String, Operation)> = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT id, operation FROM deployments WHERE status IN {IN_FLIGHT_SQL} ORDER BY rowid"
                ))
                .db_context("Failed to prepare query")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, enum_column(row, 1)?)))
                .db_context("Failed to query in-flight deployments")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .db_context("Failed to collect in-flight deployments")?;
            rows
        };

        let now = Timestamp::now().to_string();
        let mut failed = Vec::new();
        for (id, operation) in candidates {
            if exclude.contains(&id) {
                continue;
            }
            tx.execute(
                UPDATE_COMPLETION_SQL,
                params![
                    operation.failure_status().as_str(),
                    None::<String>,
                    reason,
                    None::<String>,
                    &now,
                    &id
                ],
            )
            .db_context("Failed to fail in-flight deployment")?;
            failed.push(id);
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(failed)
    }
}
