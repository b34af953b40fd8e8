use async_trait::async_trait;

use super::resource::{HandlerConfig, NoPayload, Resource};
use crate::error::AppResult;
use crate::filters::{FilterKey, FilterSet};
use crate::models::Ticket;
use crate::policy::{Action, Policy};
use crate::store::ResourceStore;

/// Билеты только читаются; создаются они вместе с бронью.
pub struct Tickets;

#[async_trait]
impl Resource for Tickets {
    type Record = Ticket;
    type Output = Ticket;
    type Payload = NoPayload;

    const CONFIG: HandlerConfig = HandlerConfig {
        prefix: "tickets",
        name: "Ticket",
        actions: &[Action::List, Action::Retrieve],
        class_policies: &[Policy::ReadOnlyIfAuthenticated],
        instance_policies: &[Policy::OwnerOrStaffInstance],
        filters: &[FilterKey::ShowSessions],
    };

    fn render(ticket: Ticket) -> Ticket {
        ticket
    }

    fn owner(ticket: &Ticket) -> Option<i64> {
        Some(ticket.owner)
    }

    async fn list(store: &dyn ResourceStore, filters: &FilterSet) -> AppResult<Vec<Ticket>> {
        Ok(store.list_tickets(filters).await?)
    }

    async fn fetch(store: &dyn ResourceStore, id: i64) -> AppResult<Option<Ticket>> {
        Ok(store.get_ticket(id).await?)
    }
}
