use std::slice;

use crate::filters::{FilterKey, Filterable};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user: i64,
    pub tickets: Vec<Ticket>,
}

impl Filterable for Reservation {
    fn id(&self) -> i64 {
        self.id
    }

    fn related(&self, key: FilterKey) -> &[i64] {
        match key {
            FilterKey::User => slice::from_ref(&self.user),
            _ => &[],
        }
    }
}
