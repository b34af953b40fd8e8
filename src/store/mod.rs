//! Хранилище ресурсов планетария.
//!
//! Обработчики работают только через [`ResourceStore`]; реализации -
//! Postgres ([`postgres::PgStore`]) и память ([`memory::MemoryStore`]).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::filters::FilterSet;
use crate::models::{
    Dome, NewDome, NewSession, NewShow, NewTheme, NewTicket, NewUser, Reservation, Session, Show,
    Theme, Ticket, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Внешний ключ указывает на несуществующую запись.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Нарушена уникальность.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Билет оказался бы вне зала своего сеанса.
    #[error("seat out of bounds: {0}")]
    SeatOutOfBounds(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    // === Купола ===
    async fn list_domes(&self, filters: &FilterSet) -> StoreResult<Vec<Dome>>;
    async fn get_dome(&self, id: i64) -> StoreResult<Option<Dome>>;
    async fn insert_dome(&self, dome: NewDome) -> StoreResult<Dome>;
    /// Отказ с [`StoreError::SeatOutOfBounds`], если выданный билет не помещается в новый размер.
    async fn update_dome(&self, id: i64, dome: NewDome) -> StoreResult<Option<Dome>>;
    /// Каскадно удаляет сеансы купола и их билеты.
    async fn delete_dome(&self, id: i64) -> StoreResult<bool>;

    // === Темы ===
    async fn list_themes(&self, filters: &FilterSet) -> StoreResult<Vec<Theme>>;
    async fn get_theme(&self, id: i64) -> StoreResult<Option<Theme>>;
    async fn insert_theme(&self, theme: NewTheme) -> StoreResult<Theme>;
    async fn update_theme(&self, id: i64, theme: NewTheme) -> StoreResult<Option<Theme>>;

    // === Шоу ===
    async fn list_shows(&self, filters: &FilterSet) -> StoreResult<Vec<Show>>;
    async fn get_show(&self, id: i64) -> StoreResult<Option<Show>>;
    async fn insert_show(&self, show: NewShow) -> StoreResult<Show>;
    async fn update_show(&self, id: i64, show: NewShow) -> StoreResult<Option<Show>>;

    // === Сеансы ===
    async fn list_sessions(&self, filters: &FilterSet) -> StoreResult<Vec<Session>>;
    async fn get_session(&self, id: i64) -> StoreResult<Option<Session>>;
    async fn insert_session(&self, session: NewSession) -> StoreResult<Session>;
    /// Перенос в другой купол проверяет места уже выданных билетов.
    async fn update_session(&self, id: i64, session: NewSession) -> StoreResult<Option<Session>>;

    // === Билеты ===
    async fn list_tickets(&self, filters: &FilterSet) -> StoreResult<Vec<Ticket>>;
    async fn get_ticket(&self, id: i64) -> StoreResult<Option<Ticket>>;

    // === Брони ===
    async fn list_reservations(&self, filters: &FilterSet) -> StoreResult<Vec<Reservation>>;
    async fn get_reservation(&self, id: i64) -> StoreResult<Option<Reservation>>;
    /// Создаёт бронь и все её билеты атомарно; занятое место - [`StoreError::Conflict`],
    /// место вне зала - [`StoreError::SeatOutOfBounds`].
    async fn insert_reservation(&self, user: i64, tickets: Vec<NewTicket>) -> StoreResult<Reservation>;

    // === Пользователи ===
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
}
