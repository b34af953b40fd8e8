use std::slice;

use crate::filters::{FilterKey, Filterable};
use serde::Serialize;
use sqlx::FromRow;

use super::Dome;

/// Билет; `owner` - владелец брони, в которую входит билет.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session: i64,
    pub reservation: i64,
    #[serde(skip_serializing)]
    pub owner: i64,
}

impl Filterable for Ticket {
    fn id(&self) -> i64 {
        self.id
    }

    fn related(&self, key: FilterKey) -> &[i64] {
        match key {
            FilterKey::ShowSessions => slice::from_ref(&self.show_session),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NewTicket {
    pub row: i32,
    pub seat: i32,
    pub show_session: i64,
}

/// Проверяет, что место существует в зале сеанса.
pub fn check_seat(dome: &Dome, row: i32, seat: i32) -> Result<(), String> {
    if dome.has_seat(row, seat) {
        Ok(())
    } else {
        Err(format!(
            "seat {seat} in row {row} is outside dome '{}' ({} rows x {} seats)",
            dome.name, dome.rows, dome.seats_in_row
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_seat_reports_dome_bounds() {
        let dome = Dome { id: 1, name: "Andromeda".to_string(), rows: 2, seats_in_row: 3 };
        assert!(check_seat(&dome, 2, 3).is_ok());

        let err = check_seat(&dome, 3, 1).unwrap_err();
        assert!(err.contains("row 3"));
        assert!(err.contains("2 rows x 3 seats"));
    }
}
