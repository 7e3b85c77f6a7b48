//! campus_query_server: REST server for natural-language queries.
//!
//! Configuration comes from the environment (and `.env`), see
//! [`campus_query::config::AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use campus_query::ai::create_llm_client;
use campus_query::config::AppConfig;
use campus_query::database::{check_schema_compatibility, DatabaseManager};
use campus_query::nlq::{HistoryWriter, QueryOrchestrator, ResponseFormatter, SqlGenerator};
use campus_query::ports::{HistoryStore, QueryExecutor};
use campus_query::server::{build_router, AppState, JwtConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus_query=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let db = DatabaseManager::new(config.database.clone())
        .await
        .context("failed to connect to database")?;
    if let Err(e) = db.run_migrations().await {
        tracing::warn!("migrations not applied: {}", e);
    }

    // Schema drift is reported, never fatal.
    let pool = db.pool().clone();
    tokio::spawn(async move {
        match check_schema_compatibility(&pool).await {
            Ok(report) => report.log(),
            Err(e) => tracing::warn!("schema check failed: {}", e),
        }
    });

    let generation_llm = create_llm_client(config.llm.backend, config.llm.generation.clone())?;
    let formatting_llm = create_llm_client(config.llm.backend, config.llm.formatting.clone())?;

    let executor: Arc<dyn QueryExecutor> =
        Arc::new(db.query_executor(config.policy.statement_timeout_ms));
    let history: Arc<dyn HistoryStore> = Arc::new(db.history_store());
    let (writer, writer_handle) = HistoryWriter::spawn(Arc::clone(&history));

    let orchestrator = QueryOrchestrator::new(
        SqlGenerator::new(generation_llm),
        ResponseFormatter::new(formatting_llm),
        Arc::clone(&executor),
        writer,
    )
    .with_policy(config.policy.sql_policy());
    tracing::info!(
        strict_parse = config.policy.strict_parse,
        statement_timeout_ms = config.policy.statement_timeout_ms,
        "query orchestrator ready"
    );

    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        history,
        executor,
    });
    let app = build_router(state, JwtConfig::from_secret(config.server.jwt_secret.as_bytes()));

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.bind_addr))?;
    tracing::info!("campus_query_server listening on {}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;

    // Router dropped: the writer drains what is queued, then stops.
    if tokio::time::timeout(Duration::from_secs(5), writer_handle)
        .await
        .is_err()
    {
        tracing::warn!("chat history writer did not drain in time");
    }
    db.close().await;
    Ok(())
}
