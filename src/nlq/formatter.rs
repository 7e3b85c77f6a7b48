//! Response formatting adapter: narrates a result set through the oracle,
//! with a templated fallback so formatting can never fail a request.

use std::sync::Arc;

use tracing::warn;

use crate::ai::LlmClient;
use crate::types::Row;

/// Rows included in the narration prompt.
pub const PROMPT_ROW_LIMIT: usize = 10;

const SYSTEM_PROMPT: &str = "You are a friendly college assistant. You explain database query \
results to students, faculty and administrators in plain conversational English.";

pub struct ResponseFormatter {
    client: Arc<dyn LlmClient>,
}

impl ResponseFormatter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn format(&self, question: &str, sql: &str, rows: &[Row]) -> String {
        let prompt = build_prompt(question, sql, rows);
        match self.client.chat(SYSTEM_PROMPT, &prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("oracle returned an empty narration, using fallback");
                fallback_response(rows.len())
            }
            Err(e) => {
                warn!("response formatting failed, using fallback: {}", e);
                fallback_response(rows.len())
            }
        }
    }
}

/// Deterministic narration used when the oracle is unavailable.
pub fn fallback_response(row_count: usize) -> String {
    if row_count == 0 {
        "No records found for your query.".to_string()
    } else {
        format!("Found {row_count} record(s). Here are the results.")
    }
}

fn build_prompt(question: &str, sql: &str, rows: &[Row]) -> String {
    let shown = &rows[..rows.len().min(PROMPT_ROW_LIMIT)];
    let data = serde_json::to_string_pretty(shown).unwrap_or_else(|_| "[]".to_string());
    let truncated = if rows.len() > PROMPT_ROW_LIMIT {
        format!("\n... (showing first {PROMPT_ROW_LIMIT} rows)")
    } else {
        String::new()
    };

    format!(
        r#"The user asked: "{question}"

The SQL query executed was: {sql}

The query returned {count} row(s).

Results data:
{data}{truncated}

Write a short, natural answer that:
1. Answers the question directly
2. Summarises the key findings and mentions how many records were found
3. Highlights important values
4. If there are no results, says that no matching records were found

Response (plain text, no markdown):"#,
        count = rows.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, AiResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingLlm {
        reply: AiResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(AiError::InvalidResponse("boom".into())),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn chat(&self, _system: &str, user: &str) -> AiResult<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(AiError::InvalidResponse("boom".into())),
            }
        }
        fn model_name(&self) -> &str {
            "recording"
        }
        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("mark_id".into(), json!(i));
                row
            })
            .collect()
    }

    #[test]
    fn fallback_texts() {
        assert_eq!(fallback_response(0), "No records found for your query.");
        assert_eq!(fallback_response(1), "Found 1 record(s). Here are the results.");
        assert_eq!(fallback_response(12), "Found 12 record(s). Here are the results.");
    }

    #[tokio::test]
    async fn narration_is_trimmed() {
        let fmt = ResponseFormatter::new(Arc::new(RecordingLlm::replying("  You have 2 marks. \n")));
        assert_eq!(fmt.format("q", "SELECT 1", &rows(2)).await, "You have 2 marks.");
    }

    #[tokio::test]
    async fn failure_falls_back() {
        let fmt = ResponseFormatter::new(Arc::new(RecordingLlm::failing()));
        assert_eq!(
            fmt.format("q", "SELECT 1", &[]).await,
            "No records found for your query."
        );
        assert_eq!(
            fmt.format("q", "SELECT 1", &rows(3)).await,
            "Found 3 record(s). Here are the results."
        );
    }

    #[tokio::test]
    async fn empty_narration_falls_back() {
        let fmt = ResponseFormatter::new(Arc::new(RecordingLlm::replying("   ")));
        assert_eq!(
            fmt.format("q", "SELECT 1", &rows(1)).await,
            "Found 1 record(s). Here are the results."
        );
    }

    #[tokio::test]
    async fn prompt_is_capped_at_ten_rows() {
        let llm = Arc::new(RecordingLlm::replying("ok"));
        let fmt = ResponseFormatter::new(llm.clone());
        fmt.format("all marks", "SELECT * FROM marks_student", &rows(25)).await;

        let prompts = llm.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("returned 25 row(s)"));
        assert!(prompt.contains("\"mark_id\": 9"));
        assert!(!prompt.contains("\"mark_id\": 10"));
        assert!(prompt.contains("showing first 10 rows"));
    }
}
