//! Accounts and sessions
//!
//! Passwords are stored as Argon2id PHC strings. A session is an HS256 token in
//! an HTTP-only cookie whose `sub` is the internal user id.

use crate::error::{AppError, AppResult, AuthFailure};
use crate::models::User;
use crate::services::user_directory::UserDirectory;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use error_types::error_codes;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_USERNAME_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Resolves the identity behind an HTTP session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Internal user id for a session token, or `AppError::Unauthorized`.
    async fn identify(&self, session_token: Option<&str>) -> AppResult<i64>;
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            AppError::Internal
        })
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<()> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = %e, "stored password hash is malformed");
        AppError::Internal
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized(AuthFailure::InvalidCredentials))
}

/// Trim and check a username; returns the form that is stored.
pub fn normalize_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::validation(error_codes::INVALID_REQUEST, "Username is required."));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation(
            error_codes::INVALID_REQUEST,
            format!("Username must be at most {MAX_USERNAME_LEN} characters."),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AppError::validation(
            error_codes::INVALID_REQUEST,
            "Username may only contain letters, digits, '_', '.' and '-'.",
        ));
    }
    Ok(username.to_string())
}

pub fn check_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation(error_codes::INVALID_REQUEST, "Password is required."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            error_codes::INVALID_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Internal user id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "failed to sign session token");
            AppError::Internal
        })
    }

    pub fn verify(&self, token: &str) -> AppResult<i64> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!(error = %e, "session token rejected");
                AppError::Unauthorized(AuthFailure::InvalidSession)
            })?;

        data.claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized(AuthFailure::InvalidSession))
    }
}

#[async_trait]
impl IdentityProvider for SessionTokens {
    async fn identify(&self, session_token: Option<&str>) -> AppResult<i64> {
        match session_token {
            None | Some("") => Err(AppError::Unauthorized(AuthFailure::MissingSession)),
            Some(token) => self.verify(token),
        }
    }
}

/// Registration and login
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    tokens: Arc<SessionTokens>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserDirectory>, tokens: Arc<SessionTokens>) -> Self {
        Self { users, tokens }
    }

    pub async fn register(&self, username: &str, password: &str) -> AppResult<User> {
        let username = normalize_username(username)?;
        check_password(password)?;

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing task failed");
                AppError::Internal
            })??;

        let user = self.users.create(&username, &hash).await?;
        tracing::info!(user = %user.uuid, username = %user.username, "user registered");
        Ok(user)
    }

    /// Returns the user and a fresh session token.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<(User, String)> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AppError::Unauthorized(AuthFailure::InvalidCredentials))?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password verification task failed");
                AppError::Internal
            })??;

        let token = self.tokens.issue(user.id)?;
        tracing::info!(user = %user.uuid, "user logged in");
        Ok((user, token))
    }
}
