//! Обобщённые обработчики ресурсов.
//!
//! Каждый ресурс описывает себя через [`Resource`]: набор действий, политики
//! класса и экземпляра, распознаваемые фильтры. Порядок проверок одинаков
//! для всех: политика класса, поиск записи (404), политика экземпляра,
//! разбор тела запроса.

use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::MethodRouter,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use super::validated;
use crate::error::{AppError, AppResult};
use crate::filters::{FilterKey, FilterSet};
use crate::policy::{self, Action, Actor, Policy};
use crate::store::ResourceStore;
use crate::AppState;

/// Статическая конфигурация обработчика ресурса.
#[derive(Debug, Clone, Copy)]
pub struct HandlerConfig {
    /// Сегмент пути под `/api/planetarium`.
    pub prefix: &'static str,
    /// Имя ресурса для сообщений об ошибках.
    pub name: &'static str,
    pub actions: &'static [Action],
    pub class_policies: &'static [Policy],
    pub instance_policies: &'static [Policy],
    pub filters: &'static [FilterKey],
}

impl HandlerConfig {
    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// Тело для ресурсов без записи через API.
#[derive(Debug, Deserialize, Validate)]
pub struct NoPayload {}

#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Record: Send + 'static;
    type Output: Serialize + Send;
    type Payload: DeserializeOwned + Validate + Send + 'static;

    const CONFIG: HandlerConfig;

    fn render(record: Self::Record) -> Self::Output;

    /// Владелец записи для политик экземпляра.
    fn owner(_record: &Self::Record) -> Option<i64> {
        None
    }

    /// Базовая выборка для актора; по умолчанию без ограничений.
    fn scope(filters: FilterSet, _actor: &Actor) -> FilterSet {
        filters
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Self::Record>>;

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Self::Record>>;

    async fn create(
        _store: &dyn ResourceStore,
        _actor: &Actor,
        _payload: Self::Payload,
    ) -> AppResult<Self::Record> {
        Err(unsupported(Self::CONFIG, Action::Create))
    }

    async fn update(
        _store: &dyn ResourceStore,
        _id: i64,
        _payload: Self::Payload,
    ) -> AppResult<Option<Self::Record>> {
        Err(unsupported(Self::CONFIG, Action::Update))
    }

    async fn destroy(_store: &dyn ResourceStore, _id: i64) -> AppResult<bool> {
        Err(unsupported(Self::CONFIG, Action::Destroy))
    }
}

fn unsupported(config: HandlerConfig, action: Action) -> AppError {
    AppError::Internal(format!("{} does not support {}", config.name, action))
}

fn not_found(config: HandlerConfig, id: i64) -> AppError {
    AppError::NotFound(format!("{} {}", config.name, id))
}

// Нечисловой id не может указывать на запись
fn record_id(config: HandlerConfig, path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::NotFound(config.name.to_string()))
}

/// Регистрирует только разрешённые действия; остальные методы получают 405.
pub fn routes<R: Resource>() -> Router<Arc<AppState>> {
    let config = R::CONFIG;

    let mut collection = MethodRouter::new();
    if config.allows(Action::List) {
        collection = collection.get(list::<R>);
    }
    if config.allows(Action::Create) {
        collection = collection.post(create::<R>);
    }

    let mut member = MethodRouter::new();
    if config.allows(Action::Retrieve) {
        member = member.get(retrieve::<R>);
    }
    if config.allows(Action::Update) {
        member = member.put(update::<R>);
    }
    if config.allows(Action::Destroy) {
        member = member.delete(destroy::<R>);
    }

    Router::new()
        .route(&format!("/{}", config.prefix), collection)
        .route(&format!("/{}/{{id}}", config.prefix), member)
}

async fn list<R: Resource>(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> AppResult<Json<Vec<R::Output>>> {
    let config = R::CONFIG;
    policy::evaluate(config.class_policies, &actor, Action::List)?;

    let Query(raw) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let filters = R::scope(FilterSet::parse(config.filters, &raw)?, &actor);

    let records = R::list(state.store.as_ref(), &filters).await?;
    Ok(Json(records.into_iter().map(R::render).collect()))
}

async fn create<R: Resource>(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    body: Result<Json<R::Payload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let config = R::CONFIG;
    policy::evaluate(config.class_policies, &actor, Action::Create)?;

    let payload = validated(body)?;
    let record = R::create(state.store.as_ref(), &actor, payload).await?;
    tracing::info!(resource = config.name, %actor, "created");

    Ok((StatusCode::CREATED, Json(R::render(record))))
}

async fn retrieve<R: Resource>(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<R::Output>> {
    let config = R::CONFIG;
    policy::evaluate(config.class_policies, &actor, Action::Retrieve)?;

    let id = record_id(config, path)?;
    let record = R::fetch(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| not_found(config, id))?;
    policy::evaluate_instance(config.instance_policies, &actor, Action::Retrieve, R::owner(&record))?;

    Ok(Json(R::render(record)))
}

async fn update<R: Resource>(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<R::Payload>, JsonRejection>,
) -> AppResult<Json<R::Output>> {
    let config = R::CONFIG;
    policy::evaluate(config.class_policies, &actor, Action::Update)?;

    let id = record_id(config, path)?;
    let existing = R::fetch(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| not_found(config, id))?;
    policy::evaluate_instance(config.instance_policies, &actor, Action::Update, R::owner(&existing))?;

    let payload = validated(body)?;
    let record = R::update(state.store.as_ref(), id, payload)
        .await?
        .ok_or_else(|| not_found(config, id))?;
    tracing::info!(resource = config.name, id, %actor, "updated");

    Ok(Json(R::render(record)))
}

async fn destroy<R: Resource>(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<StatusCode> {
    let config = R::CONFIG;
    policy::evaluate(config.class_policies, &actor, Action::Destroy)?;

    let id = record_id(config, path)?;
    let existing = R::fetch(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| not_found(config, id))?;
    policy::evaluate_instance(config.instance_policies, &actor, Action::Destroy, R::owner(&existing))?;

    if !R::destroy(state.store.as_ref(), id).await? {
        return Err(not_found(config, id));
    }
    tracing::info!(resource = config.name, id, %actor, "deleted");

    Ok(StatusCode::NO_CONTENT)
}
