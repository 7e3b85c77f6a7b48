//! Runtime configuration
//!
//! Read once at startup from the environment (a `.env` file is loaded first
//! by the binaries via `dotenvy`). Secrets have no defaults.

use std::str::FromStr;
use std::time::Duration;

use crate::ai::{gemini, openai, AiConfig, LlmBackend};
use crate::error::ConfigError;
use crate::sql::SqlPolicy;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost:5432/college".to_string(),
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(30)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// HTTP listener and token verification.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
}

/// Oracle backend and the two model configurations it is used with.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub generation: AiConfig,
    pub formatting: AiConfig,
}

/// Knobs on how validated SQL is checked and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicyConfig {
    pub strict_parse: bool,
    pub statement_timeout_ms: u64,
}

impl Default for QueryPolicyConfig {
    fn default() -> Self {
        Self {
            strict_parse: false,
            statement_timeout_ms: 15_000,
        }
    }
}

impl QueryPolicyConfig {
    pub fn sql_policy(&self) -> SqlPolicy {
        SqlPolicy {
            strict_parse: self.strict_parse,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub policy: QueryPolicyConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let db_defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            database_url: env.get("DATABASE_URL").unwrap_or(db_defaults.database_url),
            max_connections: env.parse("DATABASE_POOL_SIZE", db_defaults.max_connections)?,
            connection_timeout: Duration::from_secs(env.parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 30)?),
            idle_timeout: Some(Duration::from_secs(env.parse("DATABASE_IDLE_TIMEOUT_SECS", 30)?)),
            max_lifetime: db_defaults.max_lifetime,
        };

        let bind_addr = match (env.get("BIND_ADDR"), env.get("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => {
                let port: u16 = port.parse().map_err(|_| ConfigError::Invalid {
                    name: "PORT",
                    reason: format!("'{port}' is not a port number"),
                })?;
                format!("0.0.0.0:{port}")
            }
            (None, None) => "0.0.0.0:4000".to_string(),
        };
        let server = ServerConfig {
            bind_addr,
            jwt_secret: env.require("JWT_SECRET")?,
        };

        let backend: LlmBackend = env.parse("LLM_BACKEND", LlmBackend::Gemini)?;
        let (key_var, default_model) = match backend {
            LlmBackend::Gemini => ("GEMINI_API_KEY", gemini::DEFAULT_MODEL),
            LlmBackend::OpenAi => ("OPENAI_API_KEY", openai::DEFAULT_MODEL),
        };
        let generation = AiConfig {
            api_key: env.require(key_var)?,
            model: env.get("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            timeout_seconds: env.parse("LLM_TIMEOUT_SECS", 60)?,
            ..AiConfig::default()
        };
        let formatting = match env.get("LLM_FORMAT_MODEL") {
            Some(model) => generation.with_model(model),
            None => generation.clone(),
        };

        let policy = QueryPolicyConfig {
            strict_parse: env.flag("QUERY_STRICT_PARSE", false),
            statement_timeout_ms: env.parse("QUERY_STATEMENT_TIMEOUT_MS", 15_000)?,
        };

        Ok(Self {
            database,
            server,
            llm: LlmConfig {
                backend,
                generation,
                formatting,
            },
            policy,
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: key,
                reason: e.to_string(),
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(default)
    }
}
