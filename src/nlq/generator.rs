//! SQL generation adapter
//!
//! Builds the schema + role prompt, asks the oracle for a statement, strips
//! markdown fencing and recognises the non-data sentinel. The output is a
//! candidate only; nothing here makes it safe to run.

use std::sync::Arc;

use tracing::{debug, error};

use crate::ai::{strip_code_fences, AiResult, LlmClient};
use crate::types::{CallerId, Role};

/// Sentinel the oracle returns for input that is not a data question.
pub const NON_SQL_INTENT: &str = "NON_SQL_INTENT";

/// Tables the oracle may reference. Also used by the startup schema check.
pub const SCHEMA_TABLES: &[(&str, &[&str])] = &[
    (
        "student",
        &["student_id", "usn", "name", "email", "department_id", "address", "phone", "parent_phone"],
    ),
    ("faculty", &["faculty_id", "faculty_name", "email", "department_id", "phone"]),
    ("department", &["department_id", "department_name"]),
    ("admin", &["admin_id", "username", "role"]),
    (
        "marks_student",
        &[
            "mark_id",
            "student_id",
            "usn",
            "student_name",
            "semester",
            "subject_code",
            "subject_name",
            "internal_marks",
            "external_marks",
            "total_marks",
            "result",
            "approval_status",
        ],
    ),
    (
        "student_leave_requests",
        &["leave_id", "student_id", "leave_details", "from_date", "to_date", "status"],
    ),
    (
        "student_internships",
        &["internship_id", "student_id", "company", "start_date", "end_date", "stipend", "approval_status"],
    ),
    (
        "student_certificates",
        &["certificate_id", "student_id", "certificate_type", "competition", "internship", "workshop", "approval_status"],
    ),
    (
        "student_projects",
        &["project_id", "student_id", "project_name", "domain", "impact"],
    ),
    (
        "faculty_courses",
        &["course_id", "faculty_id", "course_name", "semester", "academic_year"],
    ),
    (
        "department_activities",
        &["event_id", "department_id", "event_title", "event_details", "event_date"],
    ),
    (
        "department_circulars",
        &["circular_id", "department_id", "title", "circular_details"],
    ),
    ("login_logs", &["log_id", "user_id", "user_type", "login_date", "login_timestamp"]),
    (
        "notifications",
        &["notification_id", "user_id", "user_type", "title", "message", "is_read"],
    ),
];

/// What the oracle produced for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSql {
    Sql(String),
    NonSqlIntent,
}

impl CandidateSql {
    fn from_completion(raw: &str) -> Self {
        let cleaned = strip_code_fences(raw);
        let bare = cleaned.trim_end_matches(';').trim();
        if bare.eq_ignore_ascii_case(NON_SQL_INTENT) {
            CandidateSql::NonSqlIntent
        } else {
            CandidateSql::Sql(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CandidateSql::Sql(sql) => sql,
            CandidateSql::NonSqlIntent => NON_SQL_INTENT,
        }
    }
}

/// Turns free text into candidate SQL via the oracle.
pub struct SqlGenerator {
    client: Arc<dyn LlmClient>,
}

impl SqlGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// One oracle round trip. Errors are returned as-is and never retried.
    pub async fn generate(
        &self,
        question: &str,
        role: Role,
        caller_id: &CallerId,
    ) -> AiResult<CandidateSql> {
        let system_prompt = build_system_prompt(role, caller_id);
        let user_prompt = build_user_prompt(question);

        let raw = self
            .client
            .chat(&system_prompt, &user_prompt)
            .await
            .map_err(|e| {
                error!(provider = self.client.provider_name(), "SQL generation failed: {}", e);
                e
            })?;

        let candidate = CandidateSql::from_completion(&raw);
        debug!(candidate = candidate.as_str(), "oracle produced candidate SQL");
        Ok(candidate)
    }
}

fn schema_description() -> String {
    let mut out = String::from("Database schema for the college management system:\n\nTables:\n");
    for (i, (table, columns)) in SCHEMA_TABLES.iter().enumerate() {
        out.push_str(&format!("{}. {} ({})\n", i + 1, table, columns.join(", ")));
    }
    out
}

fn role_context(role: Role, caller_id: &CallerId) -> String {
    match role {
        Role::Student => format!(
            "You are answering for a STUDENT with student_id = {caller_id}. Only return data \
             belonging to this student. Every query touching student data must include \
             WHERE student_id = $1."
        ),
        Role::Faculty => format!(
            "You are answering for a FACULTY member with faculty_id = {caller_id}. They may see \
             their own courses, their department's data and the students in it. Filter by \
             faculty with WHERE faculty_id = $1."
        ),
        Role::Admin => "You are answering for an ADMIN with full read access. Do not add \
                        caller-specific filters unless the question asks for them."
            .to_string(),
        Role::Department => "You are answering for a DEPARTMENT HEAD with read access to all \
                             department-related data."
            .to_string(),
    }
}

pub(crate) fn build_system_prompt(role: Role, caller_id: &CallerId) -> String {
    format!(
        r#"{schema}
Notes:
- Use positional placeholders ($1, $2, ...) for the caller's id, never a literal.
- Students: filter by student_id = $1.
- Faculty: filter by faculty_id = $1 or by their department.
- Admin/department: full read access.

{role}

Rules:
1. Return ONLY one PostgreSQL SELECT statement, no explanations, no comments.
2. Never produce INSERT, UPDATE, DELETE or any DDL.
3. Use JOINs when related tables are needed and meaningful column aliases.
4. Add ORDER BY when an order is natural.
5. LIMIT 100 rows unless the question asks for a different amount.
6. If the input is not a question about this data (a greeting, small talk), reply with exactly {sentinel}.
"#,
        schema = schema_description(),
        role = role_context(role, caller_id),
        sentinel = NON_SQL_INTENT,
    )
}

pub(crate) fn build_user_prompt(question: &str) -> String {
    format!("User question: \"{question}\"\n\nSQL query:")
}
