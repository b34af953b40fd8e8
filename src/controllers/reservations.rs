use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use validator::Validate;

use super::resource::{HandlerConfig, Resource};
use crate::error::{AppError, AppResult};
use crate::filters::{FilterKey, FilterSet};
use crate::models::{ticket::check_seat, Dome, NewTicket, Reservation};
use crate::policy::{Action, Actor, Policy};
use crate::store::ResourceStore;

pub struct Reservations;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TicketPayload {
    #[validate(range(min = 1))]
    pub row: i32,
    #[validate(range(min = 1))]
    pub seat: i32,
    pub show_session: i64,
}

impl From<TicketPayload> for NewTicket {
    fn from(payload: TicketPayload) -> Self {
        NewTicket {
            row: payload.row,
            seat: payload.seat,
            show_session: payload.show_session,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReservationPayload {
    #[validate(length(min = 1, max = 100), nested)]
    pub tickets: Vec<TicketPayload>,
}

// Купол каждого упомянутого сеанса; неизвестный сеанс - 400
async fn session_domes(
    store: &dyn ResourceStore,
    tickets: &[TicketPayload],
) -> AppResult<HashMap<i64, Dome>> {
    let mut domes = HashMap::new();
    for ticket in tickets {
        if domes.contains_key(&ticket.show_session) {
            continue;
        }
        let session = store
            .get_session(ticket.show_session)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("show session {} does not exist", ticket.show_session))
            })?;
        let dome = store
            .get_dome(session.planetarium_dome)
            .await?
            .ok_or_else(|| AppError::Internal(format!("session {} has no dome", session.id)))?;
        domes.insert(session.id, dome);
    }
    Ok(domes)
}

#[async_trait]
impl Resource for Reservations {
    type Record = Reservation;
    type Output = Reservation;
    type Payload = ReservationPayload;

    const CONFIG: HandlerConfig = HandlerConfig {
        prefix: "reservations",
        name: "Reservation",
        actions: &[Action::List, Action::Create, Action::Retrieve],
        class_policies: &[Policy::Authenticated],
        instance_policies: &[Policy::OwnerOrStaffPrivate],
        filters: &[FilterKey::User],
    };

    fn render(reservation: Reservation) -> Reservation {
        reservation
    }

    fn owner(reservation: &Reservation) -> Option<i64> {
        Some(reservation.user)
    }

    /// Не-staff видит только свои брони.
    fn scope(filters: FilterSet, actor: &Actor) -> FilterSet {
        match actor {
            Actor::User { id, is_staff: false } => filters.restrict(FilterKey::User, [*id]),
            _ => filters,
        }
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Reservation>> {
        Ok(store.list_reservations(filters).await?)
    }

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Reservation>> {
        Ok(store.get_reservation(id).await?)
    }

    async fn create(
        store: &dyn ResourceStore,
        actor: &Actor,
        payload: ReservationPayload,
    ) -> AppResult<Reservation> {
        let user = actor.user_id().ok_or(AppError::Unauthenticated)?;
        let domes = session_domes(store, &payload.tickets).await?;

        let mut requested = HashSet::new();
        for ticket in &payload.tickets {
            if let Some(dome) = domes.get(&ticket.show_session) {
                check_seat(dome, ticket.row, ticket.seat).map_err(AppError::Validation)?;
            }
            if !requested.insert((ticket.show_session, ticket.row, ticket.seat)) {
                return Err(AppError::Validation(format!(
                    "seat {} in row {} is requested twice for session {}",
                    ticket.seat, ticket.row, ticket.show_session
                )));
            }
        }

        let tickets: Vec<NewTicket> = payload.tickets.into_iter().map(NewTicket::from).collect();
        let count = tickets.len();
        let reservation = store.insert_reservation(user, tickets).await?;
        tracing::info!(reservation = reservation.id, user, tickets = count, "reservation placed");

        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(tickets: serde_json::Value) -> ReservationPayload {
        serde_json::from_value(json!({ "tickets": tickets })).unwrap()
    }

    #[test]
    fn ticket_fields_are_validated_inside_the_list() {
        assert!(payload(json!([{ "row": 1, "seat": 1, "show_session": 1 }])).validate().is_ok());
        assert!(payload(json!([])).validate().is_err());

        let err = payload(json!([
            { "row": 1, "seat": 1, "show_session": 1 },
            { "row": 0, "seat": 1, "show_session": 1 }
        ]))
        .validate()
        .unwrap_err();
        assert!(err.errors().contains_key("tickets"));
    }
}
