//! Natural-language query pipeline: oracle adapters, history and the
//! orchestrator that sequences them around the SQL guard.

pub mod formatter;
pub mod generator;
pub mod history;
pub mod orchestrator;

pub use formatter::{fallback_response, ResponseFormatter};
pub use generator::{CandidateSql, SqlGenerator, NON_SQL_INTENT, SCHEMA_TABLES};
pub use history::{HistoryWriter, InMemoryHistoryStore};
pub use orchestrator::{QueryOrchestrator, GREETING};
