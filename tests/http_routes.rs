//! HTTP tests: router, bearer auth and response envelopes, with in-process doubles.

#![cfg(feature = "server")]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use campus_query::ai::{AiResult, LlmClient};
use campus_query::nlq::{
    HistoryWriter, InMemoryHistoryStore, QueryOrchestrator, ResponseFormatter, SqlGenerator,
};
use campus_query::ports::QueryExecutor;
use campus_query::server::{build_router, AppState, JwtConfig};
use campus_query::{CallerId, ExecutionError, Row};

const TEST_JWT_SECRET: &[u8] = b"http-test-secret";

struct FixedLlm(&'static str);

#[async_trait]
impl LlmClient for FixedLlm {
    async fn chat(&self, _system: &str, _user: &str) -> AiResult<String> {
        Ok(self.0.to_string())
    }
    fn model_name(&self) -> &str {
        "fixed"
    }
    fn provider_name(&self) -> &str {
        "test"
    }
}

struct StaticExecutor {
    healthy: bool,
}

#[async_trait]
impl QueryExecutor for StaticExecutor {
    async fn fetch_rows(&self, _sql: &str, _params: &[CallerId]) -> Result<Vec<Row>, ExecutionError> {
        let mut row = Row::new();
        row.insert("subject".into(), json!("DBMS"));
        row.insert("total_marks".into(), json!(88));
        Ok(vec![row])
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        if self.healthy {
            Ok(())
        } else {
            Err(ExecutionError::new("connection refused"))
        }
    }
}

fn build_test_app(generated_sql: &'static str, healthy: bool) -> axum::Router {
    let store = Arc::new(InMemoryHistoryStore::new());
    let (writer, _handle) = HistoryWriter::spawn(store.clone());
    let executor: Arc<dyn QueryExecutor> = Arc::new(StaticExecutor { healthy });
    let orchestrator = QueryOrchestrator::new(
        SqlGenerator::new(Arc::new(FixedLlm(generated_sql))),
        ResponseFormatter::new(Arc::new(FixedLlm("You scored 88 in DBMS."))),
        executor.clone(),
        writer,
    );
    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        history: store,
        executor,
    });
    build_router(state, JwtConfig::from_secret(TEST_JWT_SECRET))
}

fn make_jwt(sub: Value, role: &str) -> String {
    let claims = json!({
        "sub": sub,
        "role": role,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("failed to encode test JWT")
}

fn student_jwt() -> String {
    make_jwt(json!(42), "student")
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(
        |_| json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }),
    )
}

const STUDENT_SQL: &str = "SELECT subject, total_marks FROM marks_student WHERE student_id = $1";

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(get("/health", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn health_reports_datastore_failure() {
    let resp = build_test_app(STUDENT_SQL, false)
        .oneshot(get("/health", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(resp).await,
        json!({"status": "error", "error": "connection refused"})
    );
}

#[tokio::test]
async fn query_requires_token() {
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json("/api/chat/query", None, json!({"query": "my marks"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["success"], json!(false));
}

#[tokio::test]
async fn forged_token_is_rejected() {
    let forged = encode(
        &Header::default(),
        &json!({"sub": 42, "role": "admin", "exp": chrono::Utc::now().timestamp() + 3600}),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json("/api/chat/query", Some(&forged), json!({"query": "q"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_is_forbidden() {
    let token = make_jwt(json!(1), "parent");
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json("/api/chat/query", Some(&token), json!({"query": "q"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_query_is_a_bad_request() {
    let token = student_jwt();
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json("/api/chat/query", Some(&token), json!({"query": "   "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Query is required"));
    assert_eq!(body["errors"][0]["field"], json!("query"));
}

#[tokio::test]
async fn successful_query_envelope() {
    let token = student_jwt();
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json(
            "/api/chat/query",
            Some(&token),
            json!({"query": "show my marks"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({
            "success": true,
            "query": "show my marks",
            "sql": STUDENT_SQL,
            "response": "You scored 88 in DBMS.",
            "data": [{"subject": "DBMS", "total_marks": 88}],
            "count": 1,
        })
    );
}

#[tokio::test]
async fn policy_failure_envelope() {
    let token = student_jwt();
    let resp = build_test_app("SELECT * FROM student", true)
        .oneshot(post_json(
            "/api/chat/query",
            Some(&token),
            json!({"query": "everyone"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(resp).await,
        json!({
            "success": false,
            "message": "Student queries must filter by student_id",
            "error": "Student queries must filter by student_id",
        })
    );
}

#[tokio::test]
async fn download_returns_csv_attachment() {
    let token = student_jwt();
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json(
            "/api/chat/download",
            Some(&token),
            json!({"query": "my marks", "sql": STUDENT_SQL}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let disposition = resp.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"student_my_marks_"));
    assert!(disposition.ends_with(".csv\""));

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        String::from_utf8(bytes.to_vec()).unwrap(),
        "subject,total_marks\nDBMS,88\n"
    );
}

#[tokio::test]
async fn download_revalidates_supplied_sql() {
    let token = student_jwt();
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json(
            "/api/chat/download",
            Some(&token),
            json!({"query": "all", "sql": "SELECT * FROM marks_student"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["message"], json!("Failed to generate export file"));
    assert_eq!(body["error"], json!("Student queries must filter by student_id"));
}

#[tokio::test]
async fn download_requires_sql() {
    let token = student_jwt();
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(post_json(
            "/api/chat/download",
            Some(&token),
            json!({"query": "my marks"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await["message"],
        json!("SQL query is required for export")
    );
}

#[tokio::test]
async fn history_lists_own_entries() {
    let app = build_test_app(STUDENT_SQL, true);
    let token = student_jwt();

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/chat/query",
            Some(&token),
            json!({"query": "show my marks"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut history = Value::Null;
    for _ in 0..100 {
        let resp = app
            .clone()
            .oneshot(get("/api/chat/history?limit=5", Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        history = body_json(resp).await;
        if history["history"].as_array().is_some_and(|h| !h.is_empty()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(history["success"], json!(true));
    let entry = &history["history"][0];
    assert_eq!(entry["user_query"], json!("show my marks"));
    assert_eq!(entry["generated_sql"], json!(STUDENT_SQL));
    assert_eq!(entry["result_count"], json!(1));

    let other = make_jwt(json!(43), "student");
    let resp = app
        .oneshot(get("/api/chat/history", Some(&other)))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["history"], json!([]));
}

#[tokio::test]
async fn unknown_route_is_404_envelope() {
    let resp = build_test_app(STUDENT_SQL, true)
        .oneshot(get("/api/chat/nope", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(resp).await,
        json!({"success": false, "message": "Route GET /api/chat/nope not found"})
    );
}
