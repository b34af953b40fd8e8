use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::{BTreeMap, HashMap};

use super::{ResourceStore, StoreError, StoreResult};
use crate::database::Database;
use crate::filters::{Criterion, FilterKey, FilterSet};
use crate::models::{
    ticket::check_seat, Dome, NewDome, NewSession, NewShow, NewTheme, NewTicket, NewUser,
    Reservation, Session, Show, Theme, Ticket, User,
};

const DOME_SELECT: &str = "SELECT d.id, d.name, d.rows, d.seats_in_row FROM planetarium_domes d WHERE TRUE";

const THEME_SELECT: &str = "SELECT t.id, t.name FROM show_themes t WHERE TRUE";

const SHOW_SELECT: &str = r#"
    SELECT
        s.id,
        s.title,
        s.description,
        ARRAY(
            SELECT st.theme_id FROM astronomy_show_themes st
            WHERE st.show_id = s.id
            ORDER BY st.theme_id
        ) AS themes
    FROM astronomy_shows s
    WHERE TRUE"#;

// Шоу и купол подгружаются JOIN'ом один-к-одному, на состав выборки это не влияет
const SESSION_SELECT: &str = r#"
    SELECT
        ss.id,
        ss.astronomy_show_id AS astronomy_show,
        ss.planetarium_dome_id AS planetarium_dome,
        ss.show_time,
        s.title AS show_title,
        d.name AS dome_name,
        d.rows::BIGINT * d.seats_in_row AS capacity,
        (SELECT COUNT(*) FROM tickets t WHERE t.show_session_id = ss.id) AS tickets_issued
    FROM show_sessions ss
    JOIN astronomy_shows s ON s.id = ss.astronomy_show_id
    JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
    WHERE TRUE"#;

const TICKET_SELECT: &str = r#"
    SELECT
        t.id,
        t.row,
        t.seat,
        t.show_session_id AS show_session,
        t.reservation_id AS reservation,
        r.user_id AS owner
    FROM tickets t
    JOIN reservations r ON r.id = t.reservation_id
    WHERE TRUE"#;

const RESERVATION_SELECT: &str =
    r#"SELECT r.id, r.created_at, r.user_id AS "user" FROM reservations r WHERE TRUE"#;

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, is_staff, is_active, date_joined";

/// Как ключ фильтра отображается на колонки таблицы.
#[derive(Debug, Clone, Copy)]
enum Column {
    Text(&'static str),
    ForeignKey(&'static str),
    ManyToMany {
        table: &'static str,
        owner: &'static str,
        related: &'static str,
        outer_id: &'static str,
    },
}

fn dome_column(key: FilterKey) -> Option<Column> {
    match key {
        FilterKey::Name => Some(Column::Text("d.name")),
        _ => None,
    }
}

fn theme_column(key: FilterKey) -> Option<Column> {
    match key {
        FilterKey::Name => Some(Column::Text("t.name")),
        _ => None,
    }
}

fn show_column(key: FilterKey) -> Option<Column> {
    match key {
        FilterKey::Title => Some(Column::Text("s.title")),
        FilterKey::Themes => Some(Column::ManyToMany {
            table: "astronomy_show_themes",
            owner: "show_id",
            related: "theme_id",
            outer_id: "s.id",
        }),
        _ => None,
    }
}

fn session_column(key: FilterKey) -> Option<Column> {
    match key {
        FilterKey::AstronomyShows => Some(Column::ForeignKey("ss.astronomy_show_id")),
        FilterKey::PlanetariumDomes => Some(Column::ForeignKey("ss.planetarium_dome_id")),
        _ => None,
    }
}

fn ticket_column(key: FilterKey) -> Option<Column> {
    match key {
        FilterKey::ShowSessions => Some(Column::ForeignKey("t.show_session_id")),
        _ => None,
    }
}

fn reservation_column(key: FilterKey) -> Option<Column> {
    match key {
        FilterKey::User => Some(Column::ForeignKey("r.user_id")),
        _ => None,
    }
}

/// Дописывает условия фильтра к запросу, который уже заканчивается на `WHERE ...`.
/// Many-to-many проверяется через EXISTS, поэтому строки не размножаются.
fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    filters: &FilterSet,
    column: fn(FilterKey) -> Option<Column>,
) {
    for criterion in filters.criteria() {
        match (criterion, column(criterion.key())) {
            (Criterion::Contains { needle, .. }, Some(Column::Text(col))) => {
                // Обе стороны через LOWER базы: регистр решает её collation, а не Rust
                qb.push(format!(" AND STRPOS(LOWER({col}), LOWER("));
                qb.push_bind(needle.clone());
                qb.push(")) > 0");
            }
            (Criterion::MemberOf { ids, .. }, Some(Column::ForeignKey(col))) => {
                qb.push(format!(" AND {col} = ANY("));
                qb.push_bind(ids.iter().copied().collect::<Vec<i64>>());
                qb.push(")");
            }
            (
                Criterion::MemberOf { ids, .. },
                Some(Column::ManyToMany { table, owner, related, outer_id }),
            ) => {
                qb.push(format!(
                    " AND EXISTS (SELECT 1 FROM {table} j WHERE j.{owner} = {outer_id} AND j.{related} = ANY("
                ));
                qb.push_bind(ids.iter().copied().collect::<Vec<i64>>());
                qb.push("))");
            }
            (criterion, _) => {
                // Ключ без колонки в этой таблице: ничего не отдаём
                tracing::warn!(key = criterion.key().param(), "filter key has no column mapping");
                qb.push(" AND FALSE");
            }
        }
    }
}

fn map_db_error(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(what.to_string());
        }
        if db.is_foreign_key_violation() {
            return StoreError::InvalidReference(what.to_string());
        }
    }
    StoreError::Database(err)
}

#[derive(FromRow)]
struct ReservationRow {
    id: i64,
    created_at: DateTime<Utc>,
    user: i64,
}

// Купол сеанса, заблокированный на время вставки билетов
#[derive(FromRow)]
struct SessionDome {
    session: i64,
    #[sqlx(flatten)]
    dome: Dome,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool.clone() }
    }

    async fn attach_tickets(&self, rows: Vec<ReservationRow>) -> StoreResult<Vec<Reservation>> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut qb = QueryBuilder::<Postgres>::new(TICKET_SELECT);
        qb.push(" AND t.reservation_id = ANY(");
        qb.push_bind(ids);
        qb.push(") ORDER BY t.id");
        let tickets: Vec<Ticket> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut by_reservation: BTreeMap<i64, Vec<Ticket>> = BTreeMap::new();
        for ticket in tickets {
            by_reservation.entry(ticket.reservation).or_default().push(ticket);
        }

        Ok(rows
            .into_iter()
            .map(|row| Reservation {
                id: row.id,
                created_at: row.created_at,
                user: row.user,
                tickets: by_reservation.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }

    /// Билеты сеансов, где `scope = $1`, обязаны помещаться в `dome`.
    /// Вызывается после UPDATE, который уже держит блокировку строки.
    async fn check_seats_fit(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        scope: &'static str,
        scope_id: i64,
        dome: &Dome,
    ) -> StoreResult<()> {
        let misplaced: Option<(i64, i32, i32)> = sqlx::query_as(&format!(
            "SELECT t.show_session_id, t.row, t.seat
             FROM tickets t
             JOIN show_sessions ss ON ss.id = t.show_session_id
             WHERE {scope} = $1 AND (t.row > $2 OR t.seat > $3)
             ORDER BY t.id
             LIMIT 1"
        ))
        .bind(scope_id)
        .bind(dome.rows)
        .bind(dome.seats_in_row)
        .fetch_optional(&mut **tx)
        .await?;

        match misplaced {
            Some((session, row, seat)) => Err(StoreError::SeatOutOfBounds(format!(
                "session {session} already has a ticket at row {row}, seat {seat}, \
                 outside dome '{}' ({} rows x {} seats)",
                dome.name, dome.rows, dome.seats_in_row
            ))),
            None => Ok(()),
        }
    }

    async fn replace_show_themes(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        show_id: i64,
        themes: &[i64],
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM astronomy_show_themes WHERE show_id = $1")
            .bind(show_id)
            .execute(&mut **tx)
            .await?;
        let mut themes = themes.to_vec();
        themes.sort_unstable();
        themes.dedup();
        sqlx::query(
            "INSERT INTO astronomy_show_themes (show_id, theme_id)
             SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(show_id)
        .bind(themes)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_db_error(e, "unknown theme"))?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn list_domes(&self, filters: &FilterSet) -> StoreResult<Vec<Dome>> {
        let mut qb = QueryBuilder::<Postgres>::new(DOME_SELECT);
        push_filters(&mut qb, filters, dome_column);
        qb.push(" ORDER BY d.id");
        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }

    async fn get_dome(&self, id: i64) -> StoreResult<Option<Dome>> {
        Ok(sqlx::query_as(&format!("{DOME_SELECT} AND d.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_dome(&self, dome: NewDome) -> StoreResult<Dome> {
        Ok(sqlx::query_as(
            "INSERT INTO planetarium_domes (name, rows, seats_in_row)
             VALUES ($1, $2, $3)
             RETURNING id, name, rows, seats_in_row",
        )
        .bind(dome.name)
        .bind(dome.rows)
        .bind(dome.seats_in_row)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_dome(&self, id: i64, dome: NewDome) -> StoreResult<Option<Dome>> {
        let mut tx = self.pool.begin().await?;
        let updated: Option<Dome> = sqlx::query_as(
            "UPDATE planetarium_domes SET name = $2, rows = $3, seats_in_row = $4
             WHERE id = $1
             RETURNING id, name, rows, seats_in_row",
        )
        .bind(id)
        .bind(dome.name)
        .bind(dome.rows)
        .bind(dome.seats_in_row)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(updated) = updated else {
            return Ok(None);
        };

        Self::check_seats_fit(&mut tx, "ss.planetarium_dome_id", id, &updated).await?;
        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_dome(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM planetarium_domes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_themes(&self, filters: &FilterSet) -> StoreResult<Vec<Theme>> {
        let mut qb = QueryBuilder::<Postgres>::new(THEME_SELECT);
        push_filters(&mut qb, filters, theme_column);
        qb.push(" ORDER BY t.id");
        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }

    async fn get_theme(&self, id: i64) -> StoreResult<Option<Theme>> {
        Ok(sqlx::query_as(&format!("{THEME_SELECT} AND t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_theme(&self, theme: NewTheme) -> StoreResult<Theme> {
        Ok(sqlx::query_as("INSERT INTO show_themes (name) VALUES ($1) RETURNING id, name")
            .bind(theme.name)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_theme(&self, id: i64, theme: NewTheme) -> StoreResult<Option<Theme>> {
        Ok(sqlx::query_as("UPDATE show_themes SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(theme.name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_shows(&self, filters: &FilterSet) -> StoreResult<Vec<Show>> {
        let mut qb = QueryBuilder::<Postgres>::new(SHOW_SELECT);
        push_filters(&mut qb, filters, show_column);
        qb.push(" ORDER BY s.id");
        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }

    async fn get_show(&self, id: i64) -> StoreResult<Option<Show>> {
        Ok(sqlx::query_as(&format!("{SHOW_SELECT} AND s.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_show(&self, show: NewShow) -> StoreResult<Show> {
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO astronomy_shows (title, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(&show.title)
        .bind(&show.description)
        .fetch_one(&mut *tx)
        .await?;
        Self::replace_show_themes(&mut tx, id, &show.themes).await?;
        tx.commit().await?;

        self.get_show(id)
            .await?
            .ok_or_else(|| StoreError::InvalidReference(format!("astronomy show {id}")))
    }

    async fn update_show(&self, id: i64, show: NewShow) -> StoreResult<Option<Show>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE astronomy_shows SET title = $2, description = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(&show.title)
        .bind(&show.description)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::replace_show_themes(&mut tx, id, &show.themes).await?;
        tx.commit().await?;
        self.get_show(id).await
    }

    async fn list_sessions(&self, filters: &FilterSet) -> StoreResult<Vec<Session>> {
        let mut qb = QueryBuilder::<Postgres>::new(SESSION_SELECT);
        push_filters(&mut qb, filters, session_column);
        qb.push(" ORDER BY ss.show_time DESC, ss.id");
        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<Session>> {
        Ok(sqlx::query_as(&format!("{SESSION_SELECT} AND ss.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO show_sessions (astronomy_show_id, planetarium_dome_id, show_time)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(session.astronomy_show)
        .bind(session.planetarium_dome)
        .bind(session.show_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "unknown astronomy show or planetarium dome"))?;

        self.get_session(id)
            .await?
            .ok_or_else(|| StoreError::InvalidReference(format!("show session {id}")))
    }

    async fn update_session(&self, id: i64, session: NewSession) -> StoreResult<Option<Session>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE show_sessions
             SET astronomy_show_id = $2, planetarium_dome_id = $3, show_time = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(session.astronomy_show)
        .bind(session.planetarium_dome)
        .bind(session.show_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, "unknown astronomy show or planetarium dome"))?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let dome: Dome = sqlx::query_as(&format!("{DOME_SELECT} AND d.id = $1 FOR SHARE"))
            .bind(session.planetarium_dome)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                StoreError::InvalidReference(format!("planetarium dome {}", session.planetarium_dome))
            })?;
        Self::check_seats_fit(&mut tx, "ss.id", id, &dome).await?;
        tx.commit().await?;

        self.get_session(id).await
    }

    async fn list_tickets(&self, filters: &FilterSet) -> StoreResult<Vec<Ticket>> {
        let mut qb = QueryBuilder::<Postgres>::new(TICKET_SELECT);
        push_filters(&mut qb, filters, ticket_column);
        qb.push(" ORDER BY t.id");
        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }

    async fn get_ticket(&self, id: i64) -> StoreResult<Option<Ticket>> {
        Ok(sqlx::query_as(&format!("{TICKET_SELECT} AND t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_reservations(&self, filters: &FilterSet) -> StoreResult<Vec<Reservation>> {
        let mut qb = QueryBuilder::<Postgres>::new(RESERVATION_SELECT);
        push_filters(&mut qb, filters, reservation_column);
        qb.push(" ORDER BY r.created_at DESC, r.id DESC");
        let rows: Vec<ReservationRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        self.attach_tickets(rows).await
    }

    async fn get_reservation(&self, id: i64) -> StoreResult<Option<Reservation>> {
        let row: Option<ReservationRow> =
            sqlx::query_as(&format!("{RESERVATION_SELECT} AND r.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(self.attach_tickets(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_reservation(&self, user: i64, tickets: Vec<NewTicket>) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO reservations (user_id) VALUES ($1) RETURNING id",
        )
        .bind(user)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, "unknown user"))?;

        // Сеанс и купол под FOR SHARE до конца вставки билетов
        let session_ids: Vec<i64> = tickets.iter().map(|ticket| ticket.show_session).collect();
        let domes: HashMap<i64, Dome> = sqlx::query_as::<_, SessionDome>(
            "SELECT ss.id AS session, d.id, d.name, d.rows, d.seats_in_row
             FROM show_sessions ss
             JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
             WHERE ss.id = ANY($1)
             FOR SHARE OF ss, d",
        )
        .bind(session_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| (row.session, row.dome))
        .collect();

        for ticket in &tickets {
            let dome = domes.get(&ticket.show_session).ok_or_else(|| {
                StoreError::InvalidReference(format!("show session {}", ticket.show_session))
            })?;
            check_seat(dome, ticket.row, ticket.seat).map_err(StoreError::SeatOutOfBounds)?;
        }

        for ticket in &tickets {
            sqlx::query(
                "INSERT INTO tickets (row, seat, show_session_id, reservation_id)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(ticket.row)
            .bind(ticket.seat)
            .bind(ticket.show_session)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_db_error(
                    e,
                    &format!(
                        "seat {} in row {} for session {}",
                        ticket.seat, ticket.row, ticket.show_session
                    ),
                )
            })?;
        }

        // Откат транзакции происходит автоматически при выходе по ошибке
        tx.commit().await?;

        self.get_reservation(id)
            .await?
            .ok_or_else(|| StoreError::InvalidReference(format!("reservation {id}")))
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, is_staff)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("email {} is already registered", user.email)))
    }
}
