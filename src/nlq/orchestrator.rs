//! Query orchestrator
//!
//! Per request:
//!
//! ```text
//! Generate ─┬─ NON_SQL_INTENT ──────────────────────────────────┐
//!           └─ Sanitize → Validate → Bind → Execute → Format ───┴─ Persist → Respond
//! ```
//!
//! Nothing reaches the executor without passing sanitize then validate.
//! Every request queues exactly one history entry, success or failure.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::error::QueryError;
use crate::nlq::formatter::ResponseFormatter;
use crate::nlq::generator::{CandidateSql, SqlGenerator};
use crate::nlq::history::{error_entry, success_entry, HistoryWriter};
use crate::ports::QueryExecutor;
use crate::sql::{self, resolve_user_placeholder, SqlPolicy};
use crate::types::{CallerIdentity, QueryAnswer, QueryRequest, Row};

/// Reply for input that is not a data question.
pub const GREETING: &str =
    "Hello! I am your college assistant. Ask me about student projects, marks, or attendance.";

/// A failed run, with the statement that was attempted if one got that far.
struct Failure {
    error: QueryError,
    attempted_sql: Option<String>,
}

impl Failure {
    fn before_sql(error: QueryError) -> Self {
        Self {
            error,
            attempted_sql: None,
        }
    }
}

pub struct QueryOrchestrator {
    generator: SqlGenerator,
    formatter: ResponseFormatter,
    policy: SqlPolicy,
    executor: Arc<dyn QueryExecutor>,
    history: HistoryWriter,
}

impl QueryOrchestrator {
    pub fn new(
        generator: SqlGenerator,
        formatter: ResponseFormatter,
        executor: Arc<dyn QueryExecutor>,
        history: HistoryWriter,
    ) -> Self {
        Self {
            generator,
            formatter,
            policy: SqlPolicy::default(),
            executor,
            history,
        }
    }

    pub fn with_policy(mut self, policy: SqlPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SqlPolicy {
        &self.policy
    }

    /// Answer a free-text question.
    #[instrument(skip_all, fields(role = %request.caller.role))]
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryAnswer, QueryError> {
        let caller = &request.caller;
        let question = request.question.as_str();

        match self.run(question, caller).await {
            Ok(answer) => {
                let rows = answer.sql.as_ref().map(|_| answer.data.as_slice());
                self.history.record(success_entry(
                    caller,
                    question,
                    answer.sql.as_deref(),
                    &answer.response,
                    rows,
                ));
                info!(count = answer.count, "query answered");
                Ok(answer)
            }
            Err(failure) => {
                error!(stage = failure.error.stage(), "query failed: {}", failure.error);
                self.history.record(error_entry(
                    caller,
                    question,
                    failure.attempted_sql.as_deref(),
                    &failure.error.to_string(),
                ));
                Err(failure.error)
            }
        }
    }

    async fn run(&self, question: &str, caller: &CallerIdentity) -> Result<QueryAnswer, Failure> {
        info!("generating SQL");
        let candidate = self
            .generator
            .generate(question, caller.role, &caller.id)
            .await
            .map_err(|e| Failure::before_sql(QueryError::Generation(e)))?;

        let raw = match candidate {
            CandidateSql::NonSqlIntent => {
                info!("non-data question, skipping execution");
                return Ok(QueryAnswer {
                    query: question.to_string(),
                    sql: None,
                    response: GREETING.to_string(),
                    data: Vec::new(),
                    count: 0,
                });
            }
            CandidateSql::Sql(raw) => resolve_user_placeholder(&raw, caller.role),
        };

        let guarded = sql::guard(&raw, caller.role, &caller.id, &self.policy)
            .map_err(|v| Failure::before_sql(v.into()))?;
        info!(params = guarded.params.len(), "SQL accepted, executing");

        let rows = self
            .executor
            .fetch_rows(&guarded.sql, &guarded.params)
            .await
            .map_err(|e| Failure {
                error: e.into(),
                attempted_sql: Some(guarded.sql.clone()),
            })?;

        let response = self.formatter.format(question, &guarded.sql, &rows).await;

        Ok(QueryAnswer {
            query: question.to_string(),
            count: rows.len(),
            sql: Some(guarded.sql),
            response,
            data: rows,
        })
    }

    /// Re-execute a client-supplied statement for export.
    ///
    /// The statement is treated exactly like oracle output: sanitized,
    /// validated and bound again before it is run. No oracle call, no
    /// history entry.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub async fn rerun(&self, sql: &str, caller: &CallerIdentity) -> Result<Vec<Row>, QueryError> {
        let guarded = sql::guard(sql, caller.role, &caller.id, &self.policy).map_err(|v| {
            error!("export SQL rejected: {}", v);
            QueryError::from(v)
        })?;
        let rows = self.executor.fetch_rows(&guarded.sql, &guarded.params).await?;
        info!(count = rows.len(), "export query executed");
        Ok(rows)
    }
}
