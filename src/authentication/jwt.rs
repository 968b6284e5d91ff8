use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, status::StatusCode},
    response::IntoResponse,
    Json,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::bookkeeping::domain::UserId;

#[derive(Deserialize, Serialize)]
pub struct TokenClaims {
    sub: String,
}

impl TokenClaims {
    /// Get the ID of the user that the token claims represent.
    ///
    /// This is the user who made the request.
    pub fn user_id(&self) -> UserId {
        UserId::new(self.sub.as_str())
    }
}

/// The key and rules used to verify bearer tokens.
#[derive(Clone)]
pub struct JwtKeys {
    decoding: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl JwtKeys {
    /// Verify HS256 tokens signed with `secret`. The audience and issuer are
    /// only checked if provided.
    pub fn new(secret: &str, audience: Option<&str>, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);

        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(validation),
        }
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for TokenClaims
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = JwtError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                debug!(
                    "Cannot extract token claims from request due to missing authentication token."
                );

                JwtError::Missing
            })?;

        keys.verify(token).map_err(|error| {
            debug!(?error, "Invalid authentication token received.");

            JwtError::Invalid
        })
    }
}

pub enum JwtError {
    Invalid,
    Missing,
}

impl IntoResponse for JwtError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            Self::Invalid => "Invalid authentication token.",
            Self::Missing => "No authentication token provided.",
        };

        let body = Json(json!({
            "message": message,
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
