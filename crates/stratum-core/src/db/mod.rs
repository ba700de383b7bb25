//! Database operations and SQLite management for plans and deployments.
//!
//! This module provides the low-level persistence layer. It owns the SQLite
//! connection, the embedded schema, and the query interfaces for plans and
//! deployments. Deployment status changes are conditional updates inside
//! immediate transactions, so two writers can never both move a record out
//! of an in-flight status.

use std::{path::Path, time::Duration};

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod deployment_queries;
pub mod migrations;
pub mod plan_queries;
mod utils;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Creates a new database connection and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
