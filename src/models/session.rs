use std::slice;

use crate::filters::{FilterKey, Filterable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Сеанс вместе с заранее подгруженными данными шоу и купола.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub id: i64,
    pub astronomy_show: i64,
    pub planetarium_dome: i64,
    pub show_time: DateTime<Utc>,
    pub show_title: String,
    pub dome_name: String,
    pub capacity: i64,
    pub tickets_issued: i64,
}

impl Session {
    pub fn tickets_available(&self) -> i64 {
        (self.capacity - self.tickets_issued).max(0)
    }
}

impl Filterable for Session {
    fn id(&self) -> i64 {
        self.id
    }

    fn related(&self, key: FilterKey) -> &[i64] {
        match key {
            FilterKey::AstronomyShows => slice::from_ref(&self.astronomy_show),
            FilterKey::PlanetariumDomes => slice::from_ref(&self.planetarium_dome),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub astronomy_show: i64,
    pub planetarium_dome: i64,
    pub show_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub astronomy_show: i64,
    pub astronomy_show_title: String,
    pub planetarium_dome: i64,
    pub planetarium_dome_name: String,
    pub show_time: DateTime<Utc>,
    pub capacity: i64,
    pub tickets_sold: i64,
    pub tickets_available: i64,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        let tickets_available = session.tickets_available();
        SessionResponse {
            id: session.id,
            astronomy_show: session.astronomy_show,
            astronomy_show_title: session.show_title,
            planetarium_dome: session.planetarium_dome,
            planetarium_dome_name: session.dome_name,
            show_time: session.show_time,
            capacity: session.capacity,
            tickets_sold: session.tickets_issued,
            tickets_available,
        }
    }
}
