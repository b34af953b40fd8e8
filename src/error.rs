//! Ошибки уровня HTTP.
//!
//! Все обработчики возвращают `Result<T, AppError>`; статус ответа
//! однозначно определяется вариантом ошибки.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::filters::FilterError;
use crate::policy::Denial;
use crate::services::auth::{PasswordError, TokenError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Нет учётных данных или они недействительны.
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthenticated,

    /// Учётные данные есть, но прав недостаточно.
    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => AppError::Unauthenticated,
            Denial::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            // Ссылки, уникальность и границы зала - ошибки клиента
            StoreError::InvalidReference(what) => {
                AppError::Validation(format!("invalid reference: {what}"))
            }
            StoreError::Conflict(what) | StoreError::SeatOutOfBounds(what) => {
                AppError::Validation(what)
            }
            other => AppError::Store(other),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::Unauthenticated
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Детали внутренних ошибок только в лог
        let message = match &self {
            AppError::Store(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
