use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::resource::{HandlerConfig, Resource};
use crate::error::AppResult;
use crate::filters::{FilterKey, FilterSet};
use crate::models::{NewSession, Session, SessionResponse};
use crate::policy::{Action, Actor, Policy};
use crate::store::ResourceStore;

pub struct Sessions;

#[derive(Debug, Deserialize, Validate)]
pub struct SessionPayload {
    pub astronomy_show: i64,
    pub planetarium_dome: i64,
    pub show_time: DateTime<Utc>,
}

impl From<SessionPayload> for NewSession {
    fn from(payload: SessionPayload) -> Self {
        NewSession {
            astronomy_show: payload.astronomy_show,
            planetarium_dome: payload.planetarium_dome,
            show_time: payload.show_time,
        }
    }
}

#[async_trait]
impl Resource for Sessions {
    type Record = Session;
    type Output = SessionResponse;
    type Payload = SessionPayload;

    const CONFIG: HandlerConfig = HandlerConfig {
        prefix: "show_sessions",
        name: "Show session",
        actions: &[Action::List, Action::Create, Action::Retrieve, Action::Update],
        class_policies: &[Policy::StaffWriteAuthenticatedRead],
        instance_policies: &[],
        filters: &[FilterKey::AstronomyShows, FilterKey::PlanetariumDomes],
    };

    fn render(session: Session) -> SessionResponse {
        session.into()
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Session>> {
        Ok(store.list_sessions(filters).await?)
    }

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Session>> {
        Ok(store.get_session(id).await?)
    }

    async fn create(
        store: &dyn ResourceStore,
        _actor: &Actor,
        payload: SessionPayload,
    ) -> AppResult<Session> {
        Ok(store.insert_session(payload.into()).await?)
    }

    async fn update(
        store: &dyn ResourceStore,
        id: i64,
        payload: SessionPayload,
    ) -> AppResult<Option<Session>> {
        Ok(store.update_session(id, payload.into()).await?)
    }
}
