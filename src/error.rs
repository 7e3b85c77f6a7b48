//! Error taxonomy for the natural-language query pipeline.
//!
//! Generation, policy and execution failures are surfaced to the caller as a
//! message string. Persistence failures never are: the history writer logs
//! them and moves on.

use thiserror::Error;

use crate::ai::AiError;

/// Rejection by the SQL policy validator. Displays as the bare reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PolicyViolation {
    pub reason: String,
}

impl PolicyViolation {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The datastore refused or failed the statement. Carries the driver message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => Self::new(db.message()),
            _ => Self::new(err.to_string()),
        }
    }
}

/// A chat history write failed.
#[derive(Debug, Clone, Error)]
#[error("failed to persist chat history: {0}")]
pub struct PersistenceError(pub String);

#[cfg(feature = "database")]
impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// Any failure surfaced from [`crate::nlq::QueryOrchestrator`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Failed to generate SQL query: {0}")]
    Generation(#[source] AiError),

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl QueryError {
    /// Pipeline stage the error was raised in.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generate",
            Self::Policy(_) => "validate",
            Self::Execution(_) => "execute",
        }
    }

    /// Every surfaced query failure maps to 500, matching the public envelope.
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Missing or malformed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
