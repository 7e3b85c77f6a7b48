//! Ports to the datastore collaborators.
//!
//! The pipeline only ever talks to storage through these traits; the
//! PostgreSQL implementations live in [`crate::database`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ExecutionError, PersistenceError};
use crate::types::{CallerId, CallerIdentity, Row};

/// Runs validated, parameterized SELECT statements.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &str, params: &[CallerId]) -> Result<Vec<Row>, ExecutionError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), ExecutionError>;
}

/// One audit record per query request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatHistoryEntry {
    pub user_id: CallerId,
    pub user_type: String,
    pub user_query: String,
    pub generated_sql: Option<String>,
    pub bot_response: String,
    pub result_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// History row as listed back to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub chat_id: i64,
    pub user_query: String,
    pub bot_response: String,
    pub generated_sql: Option<String>,
    pub created_at: DateTime<Utc>,
    pub result_count: i64,
}

/// Append-only chat history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &ChatHistoryEntry) -> Result<(), PersistenceError>;

    /// Most recent entries for `caller`, newest first.
    async fn recent(
        &self,
        caller: &CallerIdentity,
        limit: i64,
    ) -> Result<Vec<HistorySummary>, PersistenceError>;
}
