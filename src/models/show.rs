use crate::filters::{FilterKey, Filterable};
use serde::Serialize;
use sqlx::FromRow;

/// Астрономическое шоу; `themes` - id тем (many-to-many), отсортированы по возрастанию.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Show {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub themes: Vec<i64>,
}

impl Filterable for Show {
    fn id(&self) -> i64 {
        self.id
    }

    fn text(&self, key: FilterKey) -> Option<&str> {
        (key == FilterKey::Title).then_some(self.title.as_str())
    }

    fn related(&self, key: FilterKey) -> &[i64] {
        match key {
            FilterKey::Themes => self.themes.as_slice(),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewShow {
    pub title: String,
    pub description: String,
    pub themes: Vec<i64>,
}
