use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::User;
use crate::policy::Actor;
use crate::services::auth::TokenKind;
use crate::AppState;

/// Аутентифицированный пользователь; без валидного токена - 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

// Bearer-токен -> активный пользователь из хранилища.
// Нет заголовка - Ok(None); битый заголовок или токен - ошибка.
async fn resolve_user(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let claims = state.tokens.verify(token, TokenKind::Access).map_err(|e| {
        tracing::debug!("rejected bearer token: {}", e);
        AppError::Unauthenticated
    })?;

    // Роль берём из хранилища, а не из токена
    let user = state
        .store
        .get_user(claims.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or(AppError::Unauthenticated)?;

    Ok(Some(user))
}

impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(match resolve_user(parts, state).await? {
            Some(user) => Actor::User {
                id: user.id,
                is_staff: user.is_staff,
            },
            None => Actor::Anonymous,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state)
            .await?
            .map(AuthUser)
            .ok_or(AppError::Unauthenticated)
    }
}
