//! Database schema initialization and migrations.

use crate::error::{DatabaseResultExt, DeployError, Result};

impl super::Database {
    /// Initializes the database schema using the embedded SQL file.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        // WAL lets status queries read while an execution writes
        self.connection
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .db_context("Failed to enable WAL journal mode")?;

        self.connection
            .execute("PRAGMA foreign_keys = ON", [])
            .db_context("Failed to enable foreign keys")?;

        let schema_sql = include_str!("../../assets/schema.sql");
        self.connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        self.apply_migrations()?;

        Ok(())
    }

    /// Apply database migrations for existing databases
    fn apply_migrations(&self) -> Result<()> {
        let has_state_warning: bool = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('deployments') WHERE name = 'state_warning'",
                [],
                |row| row.get(0),
            )
            .map(|count: i64| count > 0)
            .unwrap_or(false);

        if !has_state_warning {
            self.connection
                .execute("ALTER TABLE deployments ADD COLUMN state_warning TEXT", [])
                .map_err(|e| {
                    DeployError::database("Failed to add state_warning column to deployments")
                        .with_source(e)
                })?;
        }

        Ok(())
    }
}
