use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::validated;
use crate::error::{AppError, AppResult};
use crate::services::auth::{self, TokenKind, TokenPair};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/token", post(obtain_token))
        .route("/token/refresh", post(refresh_token))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

async fn obtain_token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> AppResult<Json<TokenPair>> {
    let request = validated(body)?;
    let email = request.email.trim().to_lowercase();

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        tracing::debug!(%email, "token requested for unknown email");
        return Err(AppError::Unauthenticated);
    };
    if !user.is_active || !auth::verify_password(request.password, user.password_hash).await? {
        tracing::debug!(user = user.id, "token request rejected");
        return Err(AppError::Unauthenticated);
    }

    let pair = state
        .tokens
        .issue_pair(user.id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(user = user.id, "token pair issued");
    Ok(Json(pair))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<AccessToken>> {
    let request = validated(body)?;
    let claims = state.tokens.verify(&request.refresh, TokenKind::Refresh)?;

    // Пользователь мог быть удалён или заблокирован после выдачи refresh
    state
        .store
        .get_user(claims.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or(AppError::Unauthenticated)?;

    let access = state
        .tokens
        .issue(claims.user_id, TokenKind::Access)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(AccessToken { access }))
}
