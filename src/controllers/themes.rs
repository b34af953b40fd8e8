use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use super::resource::{HandlerConfig, Resource};
use super::trimmed;
use crate::error::AppResult;
use crate::filters::{FilterKey, FilterSet};
use crate::models::{NewTheme, Theme};
use crate::policy::{Action, Actor, Policy};
use crate::store::ResourceStore;

pub struct Themes;

#[derive(Debug, Deserialize, Validate)]
pub struct ThemePayload {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[async_trait]
impl Resource for Themes {
    type Record = Theme;
    type Output = Theme;
    type Payload = ThemePayload;

    const CONFIG: HandlerConfig = HandlerConfig {
        prefix: "show_themes",
        name: "Show theme",
        actions: &[Action::List, Action::Create, Action::Retrieve, Action::Update],
        class_policies: &[Policy::StaffWriteAuthenticatedRead],
        instance_policies: &[],
        filters: &[FilterKey::Name],
    };

    fn render(theme: Theme) -> Theme {
        theme
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Theme>> {
        Ok(store.list_themes(filters).await?)
    }

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Theme>> {
        Ok(store.get_theme(id).await?)
    }

    async fn create(
        store: &dyn ResourceStore,
        _actor: &Actor,
        payload: ThemePayload,
    ) -> AppResult<Theme> {
        let theme = NewTheme { name: payload.name };
        Ok(store.insert_theme(theme).await?)
    }

    async fn update(
        store: &dyn ResourceStore,
        id: i64,
        payload: ThemePayload,
    ) -> AppResult<Option<Theme>> {
        let theme = NewTheme { name: payload.name };
        Ok(store.update_theme(id, theme).await?)
    }
}
