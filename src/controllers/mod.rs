pub mod resource;
pub mod domes;
pub mod themes;
pub mod shows;
pub mod sessions;
pub mod tickets;
pub mod reservations;
pub mod tokens;
pub mod users;

use axum::{extract::rejection::JsonRejection, Json, Router};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/planetarium", planetarium_routes())
        .nest("/user", users::routes())
        .merge(tokens::routes())
}

fn planetarium_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(resource::routes::<domes::Domes>())
        .merge(resource::routes::<themes::Themes>())
        .merge(resource::routes::<shows::Shows>())
        .merge(resource::routes::<sessions::Sessions>())
        .merge(resource::routes::<tickets::Tickets>())
        .merge(resource::routes::<reservations::Reservations>())
}

/// Битый JSON и невалидные поля - одинаково 400.
pub(crate) fn validated<T: Validate>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    let Json(payload) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    payload.validate()?;
    Ok(payload)
}

/// Строка без пробелов по краям: проверки длины видят уже обрезанное значение.
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(deserializer)?.trim().to_string())
}
