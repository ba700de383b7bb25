//! Error types for the deployment library.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::{models::DeploymentStatus, runner::RunnerError, store::StorageError};

/// Comprehensive error type for all deployment operations.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: String },
    /// Deployment not found for the given ID
    #[error("Deployment with ID {id} not found")]
    DeploymentNotFound { id: String },
    /// Plan exists but its source is not available for execution
    #[error("Plan {id} is not ready for execution (status: {status})")]
    PlanNotReady { id: String, status: String },
    /// Another deployment is still in flight for the same plan
    #[error("Plan {plan_id} already has an in-flight deployment ({deployment_id})")]
    Conflict {
        plan_id: String,
        deployment_id: String,
    },
    /// A terminal deployment cannot change status again
    #[error("Deployment {id} already finished with status {status}")]
    TerminalStatus { id: String, status: DeploymentStatus },
    /// A status change that the state machine does not allow
    #[error("Invalid status transition for deployment {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },
    /// Object store failures
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Terraform process could not be launched
    #[error(transparent)]
    Runner(#[from] RunnerError),
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> DeployError {
        DeployError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> DeployError {
        DeployError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl DeployError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates a file system error for the given path.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error for a failed blocking task join.
    pub(crate) fn join(error: impl fmt::Display) -> Self {
        Self::Configuration {
            message: format!("Task join error: {error}"),
        }
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| DeployError::database(message).with_source(e))
    }
}

/// Result type alias for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;
