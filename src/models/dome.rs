use crate::filters::{FilterKey, Filterable};
use serde::Serialize;
use sqlx::FromRow;

/// Купол планетария: прямоугольный зал `rows` x `seats_in_row`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Dome {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl Dome {
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }

    /// Места нумеруются с единицы.
    pub fn has_seat(&self, row: i32, seat: i32) -> bool {
        (1..=self.rows).contains(&row) && (1..=self.seats_in_row).contains(&seat)
    }
}

impl Filterable for Dome {
    fn id(&self) -> i64 {
        self.id
    }

    fn text(&self, key: FilterKey) -> Option<&str> {
        (key == FilterKey::Name).then_some(self.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NewDome {
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}
