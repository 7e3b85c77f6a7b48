//! SQL guard: sanitize, validate, bind.
//!
//! Pure functions with no I/O. A candidate statement from the oracle (or a
//! client, on the export path) runs through these in order before anything
//! is sent to the datastore.

pub mod binder;
pub mod sanitizer;
pub mod validator;

pub use binder::{bind_parameters, max_placeholder, resolve_user_placeholder, MAX_BIND_PARAMS};
pub use sanitizer::sanitize;
pub use validator::{
    check_statement_shape, find_dangerous_pattern, find_forbidden_keyword, validate, SqlPolicy,
    FORBIDDEN_KEYWORDS,
};

use crate::error::PolicyViolation;
use crate::types::{CallerId, Role};

/// A statement that passed sanitize and validate, with its bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedSql {
    pub sql: String,
    pub params: Vec<CallerId>,
}

/// Sanitize, then validate, then bind. The only way to obtain a [`GuardedSql`].
pub fn guard(
    raw: &str,
    role: Role,
    caller_id: &CallerId,
    policy: &SqlPolicy,
) -> Result<GuardedSql, PolicyViolation> {
    let sql = sanitize(raw);
    policy.check(&sql, role)?;
    let params = bind_parameters(&sql, role, caller_id);
    Ok(GuardedSql { sql, params })
}
