//! Positional parameter binding for role-scoped execution.
//!
//! The generated SQL carries `$1`, `$2`, … placeholders but no record of what
//! each one means. For row-scoped roles every placeholder is bound to the
//! caller's own id; a placeholder that was meant as some other key then
//! over-filters instead of leaking another caller's rows.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::types::{CallerId, Role};

/// PostgreSQL's limit on bind parameters per statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Literal token the oracle sometimes emits instead of a positional index.
pub const USER_ID_TOKEN: &str = "$userId";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern"));

static USER_ID_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$userId\b").expect("user id token pattern"));

/// Highest `$N` referenced in `sql`, or 0 when there are none.
pub fn max_placeholder(sql: &str) -> usize {
    PLACEHOLDER_RE
        .captures_iter(sql)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .filter(|n| *n <= MAX_BIND_PARAMS)
        .max()
        .unwrap_or(0)
}

/// Values for the statement's positional placeholders.
pub fn bind_parameters(sql: &str, role: Role, caller_id: &CallerId) -> Vec<CallerId> {
    let count = max_placeholder(sql);
    if !role.is_row_scoped() || count == 0 {
        return Vec::new();
    }
    vec![caller_id.clone(); count]
}

/// Rewrite `$userId` to the next free positional index for row-scoped roles.
///
/// Other roles get the SQL back untouched; an unresolved `$userId` then fails
/// at the datastore rather than being bound to anything.
pub fn resolve_user_placeholder(sql: &str, role: Role) -> String {
    if !role.is_row_scoped() || !USER_ID_TOKEN_RE.is_match(sql) {
        return sql.to_string();
    }
    // `$N` in a replacement string means capture group N; insert it literally.
    let next = format!("${}", max_placeholder(sql) + 1);
    USER_ID_TOKEN_RE.replace_all(sql, NoExpand(&next)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_every_placeholder_to_caller_for_students() {
        let params = bind_parameters(
            "SELECT * FROM t WHERE a=$1 AND b=$2",
            Role::Student,
            &CallerId::from("U1"),
        );
        assert_eq!(params, vec![CallerId::from("U1"), CallerId::from("U1")]);
    }

    #[test]
    fn length_is_highest_index_not_occurrence_count() {
        let params = bind_parameters(
            "SELECT * FROM t WHERE a = $3 OR b = $1 OR c = $3",
            Role::Faculty,
            &CallerId::Int(9),
        );
        assert_eq!(params, vec![CallerId::Int(9); 3]);
    }

    #[test]
    fn admin_and_department_get_no_bindings() {
        let sql = "SELECT * FROM t WHERE a = $1";
        assert!(bind_parameters("SELECT * FROM t", Role::Admin, &CallerId::from("A1")).is_empty());
        assert!(bind_parameters(sql, Role::Admin, &CallerId::from("A1")).is_empty());
        assert!(bind_parameters(sql, Role::Department, &CallerId::from("D1")).is_empty());
    }

    #[test]
    fn no_placeholders_no_bindings() {
        assert!(bind_parameters("SELECT 1", Role::Student, &CallerId::Int(1)).is_empty());
    }

    #[test]
    fn out_of_range_indexes_are_ignored() {
        assert_eq!(max_placeholder("SELECT $1, $99999999999999999999999"), 1);
        assert_eq!(max_placeholder("SELECT $70000"), 0);
        assert_eq!(max_placeholder("SELECT $65535"), MAX_BIND_PARAMS);
    }

    #[test]
    fn user_id_token_becomes_next_index() {
        assert_eq!(
            resolve_user_placeholder("SELECT * FROM student WHERE student_id = $userId", Role::Student),
            "SELECT * FROM student WHERE student_id = $1"
        );
        assert_eq!(
            resolve_user_placeholder(
                "SELECT * FROM faculty_courses WHERE faculty_id = $userId AND semester = $1",
                Role::Faculty
            ),
            "SELECT * FROM faculty_courses WHERE faculty_id = $2 AND semester = $1"
        );
    }

    #[test]
    fn every_user_id_token_gets_the_same_index() {
        let resolved = resolve_user_placeholder(
            "SELECT * FROM marks_student WHERE student_id = $userId OR $userId IS NULL",
            Role::Student,
        );
        assert_eq!(
            resolved,
            "SELECT * FROM marks_student WHERE student_id = $1 OR $1 IS NULL"
        );
        assert_eq!(
            bind_parameters(&resolved, Role::Student, &CallerId::Int(42)),
            vec![CallerId::Int(42)]
        );
    }

    #[test]
    fn user_id_token_left_alone_for_unscoped_roles() {
        let sql = "SELECT * FROM admin WHERE admin_id = $userId";
        assert_eq!(resolve_user_placeholder(sql, Role::Admin), sql);
    }

    #[test]
    fn user_id_prefix_of_longer_identifier_is_not_rewritten() {
        let sql = "SELECT '$userIdentity' FROM student WHERE student_id = $1";
        assert_eq!(resolve_user_placeholder(sql, Role::Student), sql);
    }
}
