//! Cloud connection credentials.
//!
//! A connection id is resolved to a [`Connection`] once, before an execution
//! is accepted. The resolved environment is handed to every Terraform
//! process of that execution.

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;

use crate::error::{DeployError, Result};

/// Variables passed through by [`EnvCredentialResolver`].
const PASSTHROUGH_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
    "AWS_PROFILE",
];

/// Resolved credentials for one cloud account connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub id: String,
    /// Environment variables injected into Terraform processes
    pub env: BTreeMap<String, String>,
}

impl Connection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            env: BTreeMap::new(),
        }
    }

    /// Builder-style environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Temporary AWS session credentials.
    pub fn aws_session(
        id: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self::new(id)
            .with_env("AWS_ACCESS_KEY_ID", access_key_id)
            .with_env("AWS_SECRET_ACCESS_KEY", secret_access_key)
            .with_env("AWS_SESSION_TOKEN", session_token)
    }
}

// Values never reach logs.
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("env", &keys)
            .finish()
    }
}

/// Maps a connection id to credentials.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, connection_id: &str) -> Result<Connection>;
}

/// Resolves every connection id to the AWS credentials of the current
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialResolver;

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve(&self, connection_id: &str) -> Result<Connection> {
        if connection_id.trim().is_empty() {
            return Err(DeployError::invalid_input("connection")
                .with_reason("Connection id cannot be empty"));
        }

        let env = PASSTHROUGH_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();

        Ok(Connection {
            id: connection_id.to_string(),
            env,
        })
    }
}

/// Fixed set of connections, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    connections: BTreeMap<String, Connection>,
}

impl StaticCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.insert(connection.id.clone(), connection);
        self
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, connection_id: &str) -> Result<Connection> {
        self.connections.get(connection_id).cloned().ok_or_else(|| {
            DeployError::invalid_input("connection")
                .with_reason(format!("Unknown connection '{connection_id}'"))
        })
    }
}
