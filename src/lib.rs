//! Natural-language query layer for the college management backend.
//!
//! A caller's free-text question is turned into PostgreSQL by an LLM, then
//! sanitized, checked against a role-scoped read-only policy, bound to the
//! caller's identity, executed, and narrated back. Every request leaves one
//! entry in the chat history.
//!
//! - [`sql`] is the pure guard: sanitize, validate, bind.
//! - [`nlq`] holds the oracle adapters, history writer and orchestrator.
//! - [`database`] and [`server`] are the PostgreSQL and HTTP edges.

pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod nlq;
pub mod ports;
pub mod sql;
pub mod types;

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "server")]
pub mod server;

pub use error::{ExecutionError, PersistenceError, PolicyViolation, QueryError};
pub use nlq::QueryOrchestrator;
pub use types::{CallerId, CallerIdentity, QueryAnswer, QueryRequest, Role, Row};
