//! Fire-and-forget chat history.
//!
//! Entries go onto a bounded queue and a background task writes them to the
//! [`HistoryStore`]. When the queue is full or a write fails the entry is
//! logged and dropped; the request that produced it has already been answered.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::ports::{ChatHistoryEntry, HistoryStore, HistorySummary};
use crate::types::{CallerIdentity, Row};

/// Entries waiting for the store before new ones are dropped.
pub const HISTORY_QUEUE_CAPACITY: usize = 1024;

/// Handle for queueing history entries.
#[derive(Clone)]
pub struct HistoryWriter {
    tx: mpsc::Sender<ChatHistoryEntry>,
}

impl HistoryWriter {
    /// Start the background writer. It runs until every `HistoryWriter`
    /// clone is dropped and the queue is drained.
    pub fn spawn(store: Arc<dyn HistoryStore>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(store, HISTORY_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(
        store: Arc<dyn HistoryStore>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ChatHistoryEntry>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                match store.append(&entry).await {
                    Ok(()) => debug!(user_type = %entry.user_type, "chat history entry written"),
                    Err(e) => warn!("{}", e),
                }
            }
            debug!("history writer stopped");
        });
        (Self { tx }, handle)
    }

    /// Queue `entry`. Never blocks and never fails the caller; returns
    /// whether the entry was queued.
    pub fn record(&self, entry: ChatHistoryEntry) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(
                    user_type = %entry.user_type,
                    capacity = self.tx.max_capacity(),
                    "history queue full; chat history entry dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("history writer is not running; chat history entry dropped");
                false
            }
        }
    }
}

/// Entry for a request that produced an answer.
pub fn success_entry(
    caller: &CallerIdentity,
    question: &str,
    sql: Option<&str>,
    response: &str,
    rows: Option<&[Row]>,
) -> ChatHistoryEntry {
    ChatHistoryEntry {
        user_id: caller.id.clone(),
        user_type: caller.role.as_str().to_string(),
        user_query: question.to_string(),
        generated_sql: sql.map(str::to_string),
        bot_response: response.to_string(),
        result_data: rows.map(|r| serde_json::Value::from(r.to_vec())),
        created_at: Utc::now(),
    }
}

/// Entry for a request that failed with `message`.
pub fn error_entry(
    caller: &CallerIdentity,
    question: &str,
    attempted_sql: Option<&str>,
    message: &str,
) -> ChatHistoryEntry {
    ChatHistoryEntry {
        user_id: caller.id.clone(),
        user_type: caller.role.as_str().to_string(),
        user_query: question.to_string(),
        generated_sql: attempted_sql.map(str::to_string),
        bot_response: format!("Error: {message}"),
        result_data: None,
        created_at: Utc::now(),
    }
}

/// Process-local history, for tests and deployments without a history table.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<ChatHistoryEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ChatHistoryEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, entry: &ChatHistoryEntry) -> Result<(), PersistenceError> {
        self.entries
            .lock()
            .map_err(|_| PersistenceError("history lock poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }

    async fn recent(
        &self,
        caller: &CallerIdentity,
        limit: i64,
    ) -> Result<Vec<HistorySummary>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError("history lock poisoned".to_string()))?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);

        Ok(entries
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, e)| e.user_id == caller.id && e.user_type == caller.role.as_str())
            .take(limit)
            .map(|(i, e)| HistorySummary {
                chat_id: i as i64 + 1,
                user_query: e.user_query.clone(),
                bot_response: e.bot_response.clone(),
                generated_sql: e.generated_sql.clone(),
                created_at: e.created_at,
                result_count: e
                    .result_data
                    .as_ref()
                    .and_then(|v| v.as_array())
                    .map(|a| a.len() as i64)
                    .unwrap_or(0),
            })
            .collect())
    }
}
