/*!
 * # Operator authentication
 *
 * The dashboard has a single operator account configured through
 * `operator_username` / `operator_password_hash` (argon2 PHC string).
 * A successful login yields an HS256 access token; every `/api/v1` route
 * requires it as `Authorization: Bearer <token>`.
 */

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

const JWT_ISSUER: &str = "beach-club-auth";
const JWT_AUDIENCE: &str = "beach-club-api";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // operator username
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated operator, available to handlers as an extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub username: String,
    pub token_id: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingAuth,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token creation failed: {0}")]
    TokenCreation(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(_) | AuthError::Hashing(_) => {
                ServiceError::InternalError(err.to_string())
            }
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiration: Duration,
    pub operator_username: String,
    pub operator_password_hash: Option<String>,
}

impl AuthConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration),
            operator_username: cfg.operator_username.clone(),
            operator_password_hash: cfg.operator_password_hash.clone(),
        }
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        if config.operator_password_hash.is_none() {
            warn!("operator_password_hash is not set; every login will be refused");
        }
        Self { config }
    }

    /// Checks operator credentials and issues an access token.
    pub fn login(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let hash = self
            .config
            .operator_password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        let password_ok = verify_password(password, hash)?;
        if username != self.config.operator_username || !password_ok {
            warn!(username, "Rejected login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_token(username)
    }

    pub fn issue_token(&self, username: &str) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("invalid token duration".to_string()))?;

        let claims = Claims {
            sub: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: JWT_ISSUER.to_string(),
            aud: JWT_AUDIENCE.to_string(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[JWT_AUDIENCE]);
        validation.set_issuer(&[JWT_ISSUER]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAuth)?;

        let claims = self.validate_token(token)?;
        Ok(AuthUser {
            username: claims.sub,
            token_id: claims.jti,
        })
    }
}

/// Produces an argon2 PHC string for `operator_password_hash`.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        warn!(error = %e, "operator_password_hash is not a valid PHC string");
        AuthError::InvalidCredentials
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Rejects requests without a valid bearer token and exposes the
/// [`AuthUser`] to downstream handlers.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Ok(user) => {
            debug!(username = %user.username, "Request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "an-operator-secret-that-is-long-enough-for-hs256".to_string(),
            access_token_expiration: Duration::from_secs(3600),
            operator_username: "caixa".to_string(),
            operator_password_hash: Some(hash_password("areia-quente").unwrap()),
        })
    }

    #[test]
    fn login_issues_a_token_that_validates() {
        let auth = service();
        let token = auth.login("caixa", "areia-quente").unwrap();
        assert_eq!(token.token_type, "Bearer");

        let claims = auth.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, "caixa");
        assert_eq!(claims.aud, JWT_AUDIENCE);
    }

    #[test]
    fn wrong_password_or_user_is_rejected() {
        let auth = service();
        assert_matches!(auth.login("caixa", "errada"), Err(AuthError::InvalidCredentials));
        assert_matches!(auth.login("outro", "areia-quente"), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_invalid() {
        let other = AuthService::new(AuthConfig {
            jwt_secret: "a-completely-different-secret-for-signing-tokens".to_string(),
            ..service().config
        });
        let token = other.issue_token("caixa").unwrap();
        assert_matches!(service().validate_token(&token.access_token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn missing_header_is_rejected() {
        let auth = service();
        assert_matches!(auth.authenticate(&HeaderMap::new()), Err(AuthError::MissingAuth));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_matches!(auth.authenticate(&headers), Err(AuthError::MissingAuth));
    }

    #[test]
    fn unconfigured_password_refuses_everyone() {
        let auth = AuthService::new(AuthConfig {
            operator_password_hash: None,
            ..service().config
        });
        assert_matches!(auth.login("caixa", "areia-quente"), Err(AuthError::InvalidCredentials));
    }
}
