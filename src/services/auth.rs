//! auth.rs
//!
//! Выпуск и проверка JWT (HS256) и хеширование паролей.
//!
//! Пара токенов: короткоживущий `access` для заголовка `Authorization: Bearer`
//! и долгоживущий `refresh` для получения нового `access`.
//! Роль пользователя в токен не зашивается - `is_staff` читается из хранилища
//! при каждом запросе.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub token_type: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("expected {expected:?} token, got {actual:?}")]
    WrongKind { expected: TokenKind, actual: TokenKind },
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::hours(config.refresh_ttl_hours),
        }
    }

    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<String, TokenError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            user_id,
            token_type: kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Проверяет подпись, срок действия и тип токена.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        if data.claims.token_type != expected {
            return Err(TokenError::WrongKind {
                expected,
                actual: data.claims.token_type,
            });
        }
        Ok(data.claims)
    }
}

/// bcrypt - CPU-bound, поэтому уходит в blocking-пул.
pub async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(ok)
}
