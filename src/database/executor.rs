//! PostgreSQL query executor.
//!
//! Every statement runs in its own `READ ONLY` transaction with a local
//! `statement_timeout`, and the transaction is always rolled back.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use tracing::debug;

use crate::error::ExecutionError;
use crate::ports::QueryExecutor;
use crate::types::{CallerId, Row};

pub struct PgQueryExecutor {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            pool,
            statement_timeout_ms,
        }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn fetch_rows(&self, sql: &str, params: &[CallerId]) -> Result<Vec<Row>, ExecutionError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        let mut query = sqlx::query::<Postgres>(sql);
        for param in params {
            query = match param {
                CallerId::Int(n) => query.bind(*n),
                CallerId::Text(s) => query.bind(s.as_str()),
            };
        }

        let rows = query.fetch_all(&mut *tx).await?;
        tx.rollback().await?;

        debug!(rows = rows.len(), "statement returned");
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(ExecutionError::from)
    }
}

/// Decode a row column by column, keyed on the PostgreSQL type name.
/// Unmapped types come back as null.
pub(crate) fn row_to_json(row: &PgRow) -> Row {
    let mut map = Row::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let value: Option<Value> = match column.type_info().name() {
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map(|s| json!(s)),
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)
                .ok()
                .flatten()
                .map(|i| json!(i)),
            "INT4" => row
                .try_get::<Option<i32>, _>(idx)
                .ok()
                .flatten()
                .map(|i| json!(i)),
            "INT8" => row
                .try_get::<Option<i64>, _>(idx)
                .ok()
                .flatten()
                .map(|i| json!(i)),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(idx)
                .ok()
                .flatten()
                .map(|f| json!(f)),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(idx)
                .ok()
                .flatten()
                .map(|f| json!(f)),
            "NUMERIC" => row
                .try_get::<Option<rust_decimal::Decimal>, _>(idx)
                .ok()
                .flatten()
                .map(|d| json!(d.to_string())),
            "BOOL" => row
                .try_get::<Option<bool>, _>(idx)
                .ok()
                .flatten()
                .map(|b| json!(b)),
            "JSONB" | "JSON" => row.try_get::<Option<Value>, _>(idx).ok().flatten(),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
                .ok()
                .flatten()
                .map(|dt| json!(dt.to_rfc3339())),
            "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
                .ok()
                .flatten()
                .map(|dt| json!(dt.to_string())),
            "DATE" => row
                .try_get::<Option<chrono::NaiveDate>, _>(idx)
                .ok()
                .flatten()
                .map(|d| json!(d.to_string())),
            "TIME" => row
                .try_get::<Option<chrono::NaiveTime>, _>(idx)
                .ok()
                .flatten()
                .map(|t| json!(t.to_string())),
            _ => None,
        };

        map.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }

    map
}
