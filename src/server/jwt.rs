//! Bearer-token authentication.
//!
//! Verifies an HS256 token and inserts the caller's [`CallerIdentity`] as a
//! request extension for the handlers behind it.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::server::error::ApiError;
use crate::types::{CallerId, CallerIdentity, Role};

#[derive(Clone)]
pub struct JwtConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<CallerIdentity, ApiError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("token rejected: {}", e);
            ApiError::Unauthorized("Invalid or expired token")
        })?;
        data.claims.into_identity()
    }
}

/// Token payload. `sub` may be a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(alias = "id")]
    pub sub: CallerId,
    pub role: String,
    pub exp: u64,
}

impl JwtClaims {
    fn into_identity(self) -> Result<CallerIdentity, ApiError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| ApiError::Forbidden(format!("Access denied for role '{}'", self.role)))?;
        let id = match self.sub {
            CallerId::Text(s) => CallerId::parse(&s),
            int => int,
        };
        Ok(CallerIdentity { id, role })
    }
}

pub async fn jwt_auth(mut req: Request, next: Next) -> Response {
    let Some(config) = req.extensions().get::<JwtConfig>().cloned() else {
        return ApiError::Unauthorized("Authentication is not configured").into_response();
    };

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return ApiError::Unauthorized("Authentication required").into_response();
    };

    match config.verify(token) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}
