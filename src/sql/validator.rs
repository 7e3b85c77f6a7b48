//! SQL policy validator
//!
//! A conservative keyword blacklist plus a handful of injection patterns and
//! one role rule. The keyword checks are textual: a SELECT whose identifiers
//! or string literals contain a forbidden word (`created_at`, `'please update'`)
//! is rejected. The role rule also walks the parsed relations when the
//! statement parses. [`SqlPolicy`] can require a real parse on top.

use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;
use sqlparser::ast::{visit_relations, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::PolicyViolation;
use crate::types::Role;

/// Keywords that may not appear anywhere in a statement (case-insensitive).
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT",
    "UPDATE",
    "DELETE",
    "DROP",
    "CREATE",
    "ALTER",
    "TRUNCATE",
    "EXEC",
    "EXECUTE",
    "EXECUTE IMMEDIATE",
    "GRANT",
    "REVOKE",
    "COMMIT",
    "ROLLBACK",
    "SAVEPOINT",
    "TRANSACTION",
    "BEGIN",
    "CALL",
    "COPY",
    "VACUUM",
    "ANALYZE",
    "REINDEX",
    "CLUSTER",
];

/// A named injection pattern.
pub struct DangerousPattern {
    pub name: &'static str,
    regex: Regex,
}

static DANGEROUS_PATTERNS: LazyLock<Vec<DangerousPattern>> = LazyLock::new(|| {
    [
        (
            "stacked statement",
            r"(?i);\s*(DROP|DELETE|UPDATE|INSERT|CREATE|ALTER)",
        ),
        ("line comment", r"--"),
        ("block comment", r"/\*"),
        ("UNION SELECT", r"(?is)UNION.*SELECT"),
        ("xp_cmdshell", r"(?i)xp_cmdshell"),
        ("sp_executesql", r"(?i)sp_executesql"),
    ]
    .into_iter()
    .map(|(name, pattern)| DangerousPattern {
        name,
        regex: Regex::new(pattern).expect("dangerous pattern"),
    })
    .collect()
});

// FROM/JOIN followed by an optionally schema-qualified, optionally quoted name.
static STUDENT_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(FROM|JOIN)\s+(?:"?\w+"?\s*\.\s*)?"?(MARKS_)?STUDENT"#)
        .expect("student table pattern")
});

static STUDENT_ID_FILTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bSTUDENT_ID"?\s*=\s*\$\d"#).expect("student filter pattern")
});

// Prefix match: student_projects, student_leave_requests etc. count too.
fn is_student_table(name: &str) -> bool {
    let name = name.to_lowercase();
    name.starts_with("student") || name.starts_with("marks_student")
}

/// Whether `sql` reads a student-owned table. The pattern catches the plain
/// forms even when the statement does not parse; a successful parse also
/// catches comma joins and subqueries.
pub fn references_student_table(sql: &str) -> bool {
    if STUDENT_TABLE_RE.is_match(sql) {
        return true;
    }
    let Ok(statements) = Parser::parse_sql(&PostgreSqlDialect {}, sql) else {
        return false;
    };
    visit_relations(&statements, |relation| match relation.0.last() {
        Some(table) if is_student_table(&table.value) => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    })
    .is_break()
}

/// The forbidden keyword found in `sql`, preferring the longest match.
pub fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    let upper = sql.to_uppercase();
    FORBIDDEN_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| upper.contains(kw))
        .fold(None, |best: Option<&'static str>, kw| match best {
            Some(b) if b.len() >= kw.len() => Some(b),
            _ => Some(kw),
        })
}

/// Name of the first dangerous pattern `sql` matches.
pub fn find_dangerous_pattern(sql: &str) -> Option<&'static str> {
    DANGEROUS_PATTERNS
        .iter()
        .find(|p| p.regex.is_match(sql))
        .map(|p| p.name)
}

/// Accept or reject `sql` for `role`. `Ok(())` is the only accept signal.
pub fn validate(sql: &str, role: Role) -> Result<(), PolicyViolation> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(PolicyViolation::new("Invalid SQL query"));
    }

    if let Some(keyword) = find_forbidden_keyword(trimmed) {
        return Err(PolicyViolation::new(format!(
            "Forbidden SQL keyword detected: {keyword}"
        )));
    }

    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err(PolicyViolation::new("Only SELECT queries are allowed"));
    }

    if let Some(pattern) = find_dangerous_pattern(trimmed) {
        return Err(PolicyViolation::new(format!(
            "Potentially dangerous SQL pattern detected: {pattern}"
        )));
    }

    if role == Role::Student
        && references_student_table(trimmed)
        && !STUDENT_ID_FILTER_RE.is_match(trimmed)
    {
        return Err(PolicyViolation::new(
            "Student queries must filter by student_id",
        ));
    }

    Ok(())
}

/// Policy applied by the orchestrator: the blacklist, optionally backed by a
/// PostgreSQL parse that requires exactly one read-only query statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlPolicy {
    pub strict_parse: bool,
}

impl SqlPolicy {
    pub fn strict() -> Self {
        Self { strict_parse: true }
    }

    pub fn check(&self, sql: &str, role: Role) -> Result<(), PolicyViolation> {
        validate(sql, role)?;
        if self.strict_parse {
            check_statement_shape(sql)?;
        }
        Ok(())
    }
}

/// Parse `sql` and require a single query statement.
pub fn check_statement_shape(sql: &str) -> Result<(), PolicyViolation> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| PolicyViolation::new(format!("SQL could not be parsed: {e}")))?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [] => Err(PolicyViolation::new("Invalid SQL query")),
        [_] => Err(PolicyViolation::new("Only SELECT queries are allowed")),
        many => Err(PolicyViolation::new(format!(
            "Exactly one statement is allowed, found {}",
            many.len()
        ))),
    }
}
