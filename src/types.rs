//! Request and identity model shared by every stage of the query pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A result row: column name → value, in the column order the datastore returned.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Portal role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Department,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Department => "department",
        }
    }

    /// Student and faculty callers only ever see rows tied to their own id.
    pub fn is_row_scoped(&self) -> bool {
        matches!(self, Role::Student | Role::Faculty)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            "department" => Ok(Role::Department),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity value of a caller, bound verbatim into role-scoped placeholders.
///
/// Numeric subjects bind as `INT8` so they compare against integer key
/// columns; anything else binds as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallerId {
    Int(i64),
    Text(String),
}

impl CallerId {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<i64>() {
                return CallerId::Int(n);
            }
        }
        CallerId::Text(raw.to_string())
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerId::Int(n) => write!(f, "{n}"),
            CallerId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CallerId {
    fn from(n: i64) -> Self {
        CallerId::Int(n)
    }
}

impl From<&str> for CallerId {
    fn from(s: &str) -> Self {
        CallerId::Text(s.to_string())
    }
}

impl From<String> for CallerId {
    fn from(s: String) -> Self {
        CallerId::Text(s)
    }
}

/// Verified identity supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: CallerId,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new(id: impl Into<CallerId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// One free-text question from one caller.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub caller: CallerIdentity,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, caller: CallerIdentity) -> Self {
        Self {
            question: question.into(),
            caller,
        }
    }
}

/// Successful answer to a [`QueryRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub query: String,
    pub sql: Option<String>,
    pub response: String,
    pub data: Vec<Row>,
    pub count: usize,
}
