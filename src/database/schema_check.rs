//! Startup schema compatibility check.
//!
//! Compares the tables and columns the generation prompt advertises (plus
//! `chat_history`) with what `information_schema` reports. Mismatches are
//! reported, never fatal: a missing column surfaces later as an execution
//! error on the queries that use it.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::PgPool;
use tracing::{info, warn};

use crate::nlq::SCHEMA_TABLES;

const CHAT_HISTORY_COLUMNS: &[&str] = &[
    "chat_id",
    "user_id",
    "user_type",
    "user_query",
    "generated_sql",
    "bot_response",
    "result_data",
    "created_at",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub tables_checked: usize,
    pub issues: Vec<String>,
}

impl SchemaReport {
    pub fn is_compatible(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn log(&self) {
        if self.is_compatible() {
            info!(tables = self.tables_checked, "schema compatible");
        } else {
            for issue in &self.issues {
                warn!("schema: {}", issue);
            }
        }
    }
}

/// Column sets per table, as found in the `public` schema.
pub type ActualSchema = BTreeMap<String, BTreeSet<String>>;

pub async fn check_schema_compatibility(pool: &PgPool) -> Result<SchemaReport, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT table_name::text, column_name::text
        FROM information_schema.columns
        WHERE table_schema = 'public'
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut actual = ActualSchema::new();
    for (table, column) in rows {
        actual.entry(table).or_default().insert(column);
    }

    let mut expected: Vec<(&str, &[&str])> = SCHEMA_TABLES.to_vec();
    expected.push(("chat_history", CHAT_HISTORY_COLUMNS));
    Ok(compare_schema(&expected, &actual))
}

/// Diff the expected tables and columns against `actual`.
pub fn compare_schema(expected: &[(&str, &[&str])], actual: &ActualSchema) -> SchemaReport {
    let mut report = SchemaReport::default();

    for (table, columns) in expected {
        report.tables_checked += 1;
        let Some(present) = actual.get(*table) else {
            report.issues.push(format!("table '{table}' does not exist"));
            continue;
        };
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !present.contains(*c))
            .collect();
        if !missing.is_empty() {
            report.issues.push(format!(
                "table '{table}' is missing column(s): {}",
                missing.join(", ")
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(tables: &[(&str, &[&str])]) -> ActualSchema {
        tables
            .iter()
            .map(|(t, cols)| (t.to_string(), cols.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn matching_schema_has_no_issues() {
        let expected: &[(&str, &[&str])] = &[("student", &["student_id", "name"])];
        let actual = schema(&[("student", &["student_id", "name", "email"])]);
        let report = compare_schema(expected, &actual);
        assert!(report.is_compatible());
        assert_eq!(report.tables_checked, 1);
    }

    #[test]
    fn missing_tables_and_columns_are_reported() {
        let expected: &[(&str, &[&str])] = &[
            ("student", &["student_id", "name", "semester"]),
            ("chat_history", &["chat_id"]),
        ];
        let actual = schema(&[("student", &["student_id"])]);
        let report = compare_schema(expected, &actual);
        assert_eq!(
            report.issues,
            vec![
                "table 'student' is missing column(s): name, semester".to_string(),
                "table 'chat_history' does not exist".to_string(),
            ]
        );
    }

    #[test]
    fn prompt_tables_are_all_checked() {
        let report = compare_schema(SCHEMA_TABLES, &ActualSchema::new());
        assert_eq!(report.issues.len(), SCHEMA_TABLES.len());
    }
}
