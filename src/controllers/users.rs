use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::validated;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{NewUser, User};
use crate::services::auth;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    let request = validated(body)?;
    let password_hash = auth::hash_password(request.password, state.config.security.bcrypt_cost).await?;

    let user = state
        .store
        .insert_user(NewUser {
            email: request.email.trim().to_lowercase(),
            password_hash,
            first_name: request.first_name,
            last_name: request.last_name,
            is_staff: false,
        })
        .await?;
    tracing::info!(user = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
