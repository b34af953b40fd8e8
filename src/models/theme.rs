use crate::filters::{FilterKey, Filterable};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Theme {
    pub id: i64,
    pub name: String,
}

impl Filterable for Theme {
    fn id(&self) -> i64 {
        self.id
    }

    fn text(&self, key: FilterKey) -> Option<&str> {
        (key == FilterKey::Name).then_some(self.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NewTheme {
    pub name: String,
}
