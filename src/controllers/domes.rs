use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::resource::{HandlerConfig, Resource};
use super::trimmed;
use crate::error::AppResult;
use crate::filters::{FilterKey, FilterSet};
use crate::models::{Dome, NewDome};
use crate::policy::{Action, Actor, Policy};
use crate::store::ResourceStore;

pub struct Domes;

#[derive(Debug, Deserialize, Validate)]
pub struct DomePayload {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 1, max = 1000))]
    pub rows: i32,
    #[validate(range(min = 1, max = 1000))]
    pub seats_in_row: i32,
}

impl From<DomePayload> for NewDome {
    fn from(payload: DomePayload) -> Self {
        NewDome {
            name: payload.name,
            rows: payload.rows,
            seats_in_row: payload.seats_in_row,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DomeResponse {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

#[async_trait]
impl Resource for Domes {
    type Record = Dome;
    type Output = DomeResponse;
    type Payload = DomePayload;

    // Удаление маршрутизируется, но политика класса пускает только чтение и staff-запись
    const CONFIG: HandlerConfig = HandlerConfig {
        prefix: "planetarium_domes",
        name: "Planetarium dome",
        actions: &[Action::List, Action::Create, Action::Retrieve, Action::Update, Action::Destroy],
        class_policies: &[Policy::StaffWriteAuthenticatedRead],
        instance_policies: &[],
        filters: &[FilterKey::Name],
    };

    fn render(dome: Dome) -> DomeResponse {
        DomeResponse {
            capacity: dome.capacity(),
            id: dome.id,
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
        }
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Dome>> {
        Ok(store.list_domes(filters).await?)
    }

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Dome>> {
        Ok(store.get_dome(id).await?)
    }

    async fn create(
        store: &dyn ResourceStore,
        _actor: &Actor,
        payload: DomePayload,
    ) -> AppResult<Dome> {
        Ok(store.insert_dome(payload.into()).await?)
    }

    async fn update(
        store: &dyn ResourceStore,
        id: i64,
        payload: DomePayload,
    ) -> AppResult<Option<Dome>> {
        Ok(store.update_dome(id, payload.into()).await?)
    }

    async fn destroy(store: &dyn ResourceStore, id: i64) -> AppResult<bool> {
        Ok(store.delete_dome(id).await?)
    }
}
