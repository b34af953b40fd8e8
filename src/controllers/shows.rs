use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use super::resource::{HandlerConfig, Resource};
use super::trimmed;
use crate::error::AppResult;
use crate::filters::{FilterKey, FilterSet};
use crate::models::{NewShow, Show};
use crate::policy::{Action, Actor, Policy};
use crate::store::ResourceStore;

pub struct Shows;

#[derive(Debug, Deserialize, Validate)]
pub struct ShowPayload {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    pub description: String,
    /// id тем; несуществующие отклоняет хранилище.
    #[serde(default)]
    pub themes: Vec<i64>,
}

impl From<ShowPayload> for NewShow {
    fn from(payload: ShowPayload) -> Self {
        let mut themes = payload.themes;
        themes.sort_unstable();
        themes.dedup();
        NewShow {
            title: payload.title,
            description: payload.description,
            themes,
        }
    }
}

#[async_trait]
impl Resource for Shows {
    type Record = Show;
    type Output = Show;
    type Payload = ShowPayload;

    const CONFIG: HandlerConfig = HandlerConfig {
        prefix: "astronomy_shows",
        name: "Astronomy show",
        actions: &[Action::List, Action::Create, Action::Retrieve, Action::Update],
        class_policies: &[Policy::StaffWriteAuthenticatedRead],
        instance_policies: &[],
        filters: &[FilterKey::Title, FilterKey::Themes],
    };

    fn render(show: Show) -> Show {
        show
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Show>> {
        Ok(store.list_shows(filters).await?)
    }

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Show>> {
        Ok(store.get_show(id).await?)
    }

    async fn create(store: &dyn ResourceStore, _actor: &Actor, payload: ShowPayload) -> AppResult<Show> {
        Ok(store.insert_show(payload.into()).await?)
    }

    async fn update(
        store: &dyn ResourceStore,
        id: i64,
        payload: ShowPayload,
    ) -> AppResult<Option<Show>> {
        Ok(store.update_show(id, payload.into()).await?)
    }
}
