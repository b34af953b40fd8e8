use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{ResourceStore, StoreError, StoreResult};
use crate::filters::FilterSet;
use crate::models::{
    ticket::check_seat, Dome, NewDome, NewSession, NewShow, NewTheme, NewTicket, NewUser,
    Reservation, Session, Show, Theme, Ticket, User,
};

/// Хранилище в памяти с теми же гарантиями, что и схема Postgres:
/// внешние ключи, уникальность места на сеансе, каскадное удаление.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

struct Table<T> {
    rows: BTreeMap<i64, T>,
    last_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: BTreeMap::new(), last_id: 0 }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Clone)]
struct SessionRow {
    astronomy_show: i64,
    planetarium_dome: i64,
    show_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TicketRow {
    row: i32,
    seat: i32,
    show_session: i64,
    reservation: i64,
}

#[derive(Debug, Clone)]
struct ReservationRow {
    created_at: DateTime<Utc>,
    user: i64,
}

#[derive(Default)]
struct Tables {
    domes: Table<Dome>,
    themes: Table<Theme>,
    shows: Table<Show>,
    sessions: Table<SessionRow>,
    tickets: Table<TicketRow>,
    reservations: Table<ReservationRow>,
    users: Table<User>,
}

impl Tables {
    fn session(&self, id: i64) -> Option<Session> {
        let row = self.sessions.rows.get(&id)?;
        let show = self.shows.rows.get(&row.astronomy_show)?;
        let dome = self.domes.rows.get(&row.planetarium_dome)?;
        let tickets_issued = self
            .tickets
            .rows
            .values()
            .filter(|ticket| ticket.show_session == id)
            .count();
        Some(Session {
            id,
            astronomy_show: row.astronomy_show,
            planetarium_dome: row.planetarium_dome,
            show_time: row.show_time,
            show_title: show.title.clone(),
            dome_name: dome.name.clone(),
            capacity: dome.capacity(),
            tickets_issued: i64::try_from(tickets_issued).unwrap_or(i64::MAX),
        })
    }

    fn ticket(&self, id: i64) -> Option<Ticket> {
        let row = self.tickets.rows.get(&id)?;
        let reservation = self.reservations.rows.get(&row.reservation)?;
        Some(Ticket {
            id,
            row: row.row,
            seat: row.seat,
            show_session: row.show_session,
            reservation: row.reservation,
            owner: reservation.user,
        })
    }

    fn reservation(&self, id: i64) -> Option<Reservation> {
        let row = self.reservations.rows.get(&id)?;
        let tickets = self
            .tickets
            .rows
            .iter()
            .filter(|(_, ticket)| ticket.reservation == id)
            .filter_map(|(ticket_id, _)| self.ticket(*ticket_id))
            .collect();
        Some(Reservation {
            id,
            created_at: row.created_at,
            user: row.user,
            tickets,
        })
    }

    fn check_show_refs(&self, show: &NewShow) -> StoreResult<()> {
        match show.themes.iter().find(|id| !self.themes.rows.contains_key(*id)) {
            Some(id) => Err(StoreError::InvalidReference(format!("theme {id}"))),
            None => Ok(()),
        }
    }

    /// Все выданные билеты сеансов `sessions` должны помещаться в `dome`.
    fn check_seats_fit(&self, sessions: &HashSet<i64>, dome: &Dome) -> StoreResult<()> {
        self.tickets
            .rows
            .values()
            .filter(|ticket| sessions.contains(&ticket.show_session))
            .try_for_each(|ticket| {
                check_seat(dome, ticket.row, ticket.seat).map_err(|reason| {
                    StoreError::SeatOutOfBounds(format!(
                        "session {} already has a ticket there: {reason}",
                        ticket.show_session
                    ))
                })
            })
    }

    fn check_session_refs(&self, session: &NewSession) -> StoreResult<()> {
        if !self.shows.rows.contains_key(&session.astronomy_show) {
            return Err(StoreError::InvalidReference(format!(
                "astronomy show {}",
                session.astronomy_show
            )));
        }
        if !self.domes.rows.contains_key(&session.planetarium_dome) {
            return Err(StoreError::InvalidReference(format!(
                "planetarium dome {}",
                session.planetarium_dome
            )));
        }
        Ok(())
    }
}

fn normalized_themes(themes: &[i64]) -> Vec<i64> {
    let mut themes = themes.to_vec();
    themes.sort_unstable();
    themes.dedup();
    themes
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_domes(&self, filters: &FilterSet) -> StoreResult<Vec<Dome>> {
        let tables = self.tables.read().await;
        Ok(filters.apply(tables.domes.rows.values().cloned()))
    }

    async fn get_dome(&self, id: i64) -> StoreResult<Option<Dome>> {
        Ok(self.tables.read().await.domes.rows.get(&id).cloned())
    }

    async fn insert_dome(&self, dome: NewDome) -> StoreResult<Dome> {
        let mut tables = self.tables.write().await;
        let id = tables.domes.next_id();
        let dome = Dome {
            id,
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
        };
        tables.domes.rows.insert(id, dome.clone());
        Ok(dome)
    }

    async fn update_dome(&self, id: i64, dome: NewDome) -> StoreResult<Option<Dome>> {
        let mut tables = self.tables.write().await;
        if !tables.domes.rows.contains_key(&id) {
            return Ok(None);
        }
        let resized = Dome {
            id,
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
        };
        let sessions: HashSet<i64> = tables
            .sessions
            .rows
            .iter()
            .filter(|(_, session)| session.planetarium_dome == id)
            .map(|(session_id, _)| *session_id)
            .collect();
        tables.check_seats_fit(&sessions, &resized)?;

        tables.domes.rows.insert(id, resized.clone());
        Ok(Some(resized))
    }

    async fn delete_dome(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.domes.rows.remove(&id).is_none() {
            return Ok(false);
        }
        let sessions: HashSet<i64> = tables
            .sessions
            .rows
            .iter()
            .filter(|(_, session)| session.planetarium_dome == id)
            .map(|(session_id, _)| *session_id)
            .collect();
        tables.sessions.rows.retain(|session_id, _| !sessions.contains(session_id));
        tables
            .tickets
            .rows
            .retain(|_, ticket| !sessions.contains(&ticket.show_session));
        Ok(true)
    }

    async fn list_themes(&self, filters: &FilterSet) -> StoreResult<Vec<Theme>> {
        let tables = self.tables.read().await;
        Ok(filters.apply(tables.themes.rows.values().cloned()))
    }

    async fn get_theme(&self, id: i64) -> StoreResult<Option<Theme>> {
        Ok(self.tables.read().await.themes.rows.get(&id).cloned())
    }

    async fn insert_theme(&self, theme: NewTheme) -> StoreResult<Theme> {
        let mut tables = self.tables.write().await;
        let id = tables.themes.next_id();
        let theme = Theme { id, name: theme.name };
        tables.themes.rows.insert(id, theme.clone());
        Ok(theme)
    }

    async fn update_theme(&self, id: i64, theme: NewTheme) -> StoreResult<Option<Theme>> {
        let mut tables = self.tables.write().await;
        Ok(tables.themes.rows.get_mut(&id).map(|row| {
            row.name = theme.name;
            row.clone()
        }))
    }

    async fn list_shows(&self, filters: &FilterSet) -> StoreResult<Vec<Show>> {
        let tables = self.tables.read().await;
        Ok(filters.apply(tables.shows.rows.values().cloned()))
    }

    async fn get_show(&self, id: i64) -> StoreResult<Option<Show>> {
        Ok(self.tables.read().await.shows.rows.get(&id).cloned())
    }

    async fn insert_show(&self, show: NewShow) -> StoreResult<Show> {
        let mut tables = self.tables.write().await;
        tables.check_show_refs(&show)?;
        let id = tables.shows.next_id();
        let show = Show {
            id,
            title: show.title,
            description: show.description,
            themes: normalized_themes(&show.themes),
        };
        tables.shows.rows.insert(id, show.clone());
        Ok(show)
    }

    async fn update_show(&self, id: i64, show: NewShow) -> StoreResult<Option<Show>> {
        let mut tables = self.tables.write().await;
        if !tables.shows.rows.contains_key(&id) {
            return Ok(None);
        }
        tables.check_show_refs(&show)?;
        Ok(tables.shows.rows.get_mut(&id).map(|row| {
            row.title = show.title;
            row.description = show.description;
            row.themes = normalized_themes(&show.themes);
            row.clone()
        }))
    }

    async fn list_sessions(&self, filters: &FilterSet) -> StoreResult<Vec<Session>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .rows
            .keys()
            .filter_map(|id| tables.session(*id))
            .collect();
        sessions.sort_by(|a, b| b.show_time.cmp(&a.show_time).then(a.id.cmp(&b.id)));
        Ok(filters.apply(sessions))
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.session(id))
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        let mut tables = self.tables.write().await;
        tables.check_session_refs(&session)?;
        let id = tables.sessions.next_id();
        tables.sessions.rows.insert(
            id,
            SessionRow {
                astronomy_show: session.astronomy_show,
                planetarium_dome: session.planetarium_dome,
                show_time: session.show_time,
            },
        );
        tables
            .session(id)
            .ok_or_else(|| StoreError::InvalidReference(format!("show session {id}")))
    }

    async fn update_session(&self, id: i64, session: NewSession) -> StoreResult<Option<Session>> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.rows.contains_key(&id) {
            return Ok(None);
        }
        tables.check_session_refs(&session)?;
        if let Some(dome) = tables.domes.rows.get(&session.planetarium_dome) {
            tables.check_seats_fit(&HashSet::from([id]), dome)?;
        }
        if let Some(row) = tables.sessions.rows.get_mut(&id) {
            row.astronomy_show = session.astronomy_show;
            row.planetarium_dome = session.planetarium_dome;
            row.show_time = session.show_time;
        }
        Ok(tables.session(id))
    }

    async fn list_tickets(&self, filters: &FilterSet) -> StoreResult<Vec<Ticket>> {
        let tables = self.tables.read().await;
        let tickets = tables.tickets.rows.keys().filter_map(|id| tables.ticket(*id));
        Ok(filters.apply(tickets))
    }

    async fn get_ticket(&self, id: i64) -> StoreResult<Option<Ticket>> {
        Ok(self.tables.read().await.ticket(id))
    }

    async fn list_reservations(&self, filters: &FilterSet) -> StoreResult<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .rows
            .keys()
            .filter_map(|id| tables.reservation(*id))
            .collect();
        // Новые сверху
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(filters.apply(reservations))
    }

    async fn get_reservation(&self, id: i64) -> StoreResult<Option<Reservation>> {
        Ok(self.tables.read().await.reservation(id))
    }

    async fn insert_reservation(&self, user: i64, tickets: Vec<NewTicket>) -> StoreResult<Reservation> {
        let mut tables = self.tables.write().await;
        if !tables.users.rows.contains_key(&user) {
            return Err(StoreError::InvalidReference(format!("user {user}")));
        }

        let mut taken: HashSet<(i64, i32, i32)> = tables
            .tickets
            .rows
            .values()
            .map(|ticket| (ticket.show_session, ticket.row, ticket.seat))
            .collect();
        for ticket in &tickets {
            let dome = tables
                .sessions
                .rows
                .get(&ticket.show_session)
                .and_then(|session| tables.domes.rows.get(&session.planetarium_dome))
                .ok_or_else(|| {
                    StoreError::InvalidReference(format!("show session {}", ticket.show_session))
                })?;
            check_seat(dome, ticket.row, ticket.seat).map_err(StoreError::SeatOutOfBounds)?;
            if !taken.insert((ticket.show_session, ticket.row, ticket.seat)) {
                return Err(StoreError::Conflict(format!(
                    "seat {} in row {} is already taken for session {}",
                    ticket.seat, ticket.row, ticket.show_session
                )));
            }
        }

        let id = tables.reservations.next_id();
        tables.reservations.rows.insert(
            id,
            ReservationRow { created_at: Utc::now(), user },
        );
        for ticket in tickets {
            let ticket_id = tables.tickets.next_id();
            tables.tickets.rows.insert(
                ticket_id,
                TicketRow {
                    row: ticket.row,
                    seat: ticket.seat,
                    show_session: ticket.show_session,
                    reservation: id,
                },
            );
        }
        tables
            .reservation(id)
            .ok_or_else(|| StoreError::InvalidReference(format!("reservation {id}")))
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.rows.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.rows.values().find(|user| user.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.rows.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        let id = tables.users.next_id();
        let user = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            is_active: true,
            date_joined: Utc::now(),
        };
        tables.users.rows.insert(id, user.clone());
        Ok(user)
    }
}
