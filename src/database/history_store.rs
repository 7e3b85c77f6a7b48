//! `chat_history` table access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::PersistenceError;
use crate::ports::{ChatHistoryEntry, HistoryStore, HistorySummary};
use crate::types::CallerIdentity;

#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    chat_id: i64,
    user_query: String,
    bot_response: String,
    generated_sql: Option<String>,
    created_at: DateTime<Utc>,
    result_count: i64,
}

impl From<HistoryRow> for HistorySummary {
    fn from(row: HistoryRow) -> Self {
        Self {
            chat_id: row.chat_id,
            user_query: row.user_query,
            bot_response: row.bot_response,
            generated_sql: row.generated_sql,
            created_at: row.created_at,
            result_count: row.result_count,
        }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, entry: &ChatHistoryEntry) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO chat_history
                (user_id, user_type, user_query, generated_sql, bot_response, result_data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.user_id.to_string())
        .bind(&entry.user_type)
        .bind(&entry.user_query)
        .bind(&entry.generated_sql)
        .bind(&entry.bot_response)
        .bind(&entry.result_data)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(
        &self,
        caller: &CallerIdentity,
        limit: i64,
    ) -> Result<Vec<HistorySummary>, PersistenceError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT chat_id, user_query, bot_response, generated_sql, created_at,
                   CASE WHEN jsonb_typeof(result_data) = 'array'
                        THEN jsonb_array_length(result_data)::int8
                        ELSE 0 END AS result_count
            FROM chat_history
            WHERE user_id = $1 AND user_type = $2
            ORDER BY created_at DESC, chat_id DESC
            LIMIT $3
            "#,
        )
        .bind(caller.id.to_string())
        .bind(caller.role.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistorySummary::from).collect())
    }
}
