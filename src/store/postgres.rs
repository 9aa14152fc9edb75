//! Postgres-backed implementation of the booking store.
//!
//! # What this module is
//! Implements [`BookingStore`] using Postgres (via `sqlx`) as the durable,
//! shared backing store for rooms, users, bookings, and notification marks.
//!
//! # Key invariants
//! - The overlap check and the booking insert run inside one transaction that
//!   first takes `pg_advisory_xact_lock` keyed on the room id. Two concurrent
//!   creates for the same room serialize on that lock, so the "both passed the
//!   check" race cannot produce overlapping rows.
//! - `end_time > start_time` is also a schema CHECK constraint, so no code
//!   path can persist an inverted interval.
//! - Notification marks have a `(booking_id, kind)` primary key; the claim is
//!   `INSERT ... ON CONFLICT DO NOTHING`, making re-scans duplicate-free even
//!   across multiple service instances.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`; if they
//!   fail we fail startup rather than serving against an unknown schema.
//! - Pool sizing and acquire timeouts are explicit because hanging forever on
//!   a dead database is unacceptable for a user-facing API.
//! - Database URLs may contain credentials; never log them.
use super::{BookingStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::model::{
    Booking, BookingDetails, BookingStatus, BookingWithRoom, NotificationKind, Room, TimeRange,
    User, UserPatch,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Durable booking store backed by Postgres.
pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape for the `rooms` table.
///
/// DB-facing structs stay separate from the domain types so column names and
/// storage formats can evolve without touching the API model.
#[derive(Debug, Clone, FromRow)]
struct DbRoom {
    id: Uuid,
    name: String,
    capacity: i32,
    description: Option<String>,
    floor: Option<i32>,
    building: Option<String>,
    equipment: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<DbRoom> for Room {
    fn from(row: DbRoom) -> Self {
        Room {
            id: row.id,
            name: row.name,
            capacity: row.capacity,
            description: row.description,
            floor: row.floor,
            building: row.building,
            equipment: row.equipment,
            created_at: row.created_at,
        }
    }
}

/// Row shape for the `users` table.
#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: Uuid,
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

/// Row shape for the `bookings` table. Status is stored as text and parsed
/// into the domain enum at the boundary.
#[derive(Debug, Clone, FromRow)]
struct DbBooking {
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    title: Option<String>,
    description: Option<String>,
    attendees: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbBooking> for Booking {
    type Error = StoreError;

    fn try_from(row: DbBooking) -> Result<Self, StoreError> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Unexpected(anyhow!("unknown booking status: {}", row.status)))?;
        Ok(Booking {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            title: row.title,
            description: row.description,
            attendees: row.attendees,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Flattened join row for booking + room (+ user) detail queries.
#[derive(Debug, Clone, FromRow)]
struct DbBookingJoin {
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    title: Option<String>,
    description: Option<String>,
    attendees: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    room_name: String,
    room_capacity: i32,
    room_description: Option<String>,
    room_floor: Option<i32>,
    room_building: Option<String>,
    room_equipment: Vec<String>,
    room_created_at: DateTime<Utc>,
    user_name: String,
    user_email: String,
    user_password: String,
    user_phone: Option<String>,
    user_created_at: DateTime<Utc>,
}

impl DbBookingJoin {
    fn split(self) -> StoreResult<(Booking, Room, User)> {
        let room = Room {
            id: self.room_id,
            name: self.room_name,
            capacity: self.room_capacity,
            description: self.room_description,
            floor: self.room_floor,
            building: self.room_building,
            equipment: self.room_equipment,
            created_at: self.room_created_at,
        };
        let user = User {
            id: self.user_id,
            name: self.user_name,
            email: self.user_email,
            password: self.user_password,
            phone: self.user_phone,
            created_at: self.user_created_at,
        };
        let booking = Booking::try_from(DbBooking {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            title: self.title,
            description: self.description,
            attendees: self.attendees,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })?;
        Ok((booking, room, user))
    }
}

const BOOKING_JOIN_SELECT: &str = r#"
    SELECT b.id, b.room_id, b.user_id, b.start_time, b.end_time, b.status,
           b.title, b.description, b.attendees, b.created_at, b.updated_at,
           r.name AS room_name, r.capacity AS room_capacity,
           r.description AS room_description, r.floor AS room_floor,
           r.building AS room_building, r.equipment AS room_equipment,
           r.created_at AS room_created_at,
           u.name AS user_name, u.email AS user_email,
           u.password AS user_password, u.phone AS user_phone,
           u.created_at AS user_created_at
    FROM bookings b
    JOIN rooms r ON r.id = b.room_id
    JOIN users u ON u.id = b.user_id
"#;

impl PostgresStore {
    /// Connect to Postgres and run embedded migrations.
    ///
    /// # Errors
    /// - Connection, pool setup, or migration failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        // `max_connections` caps concurrent DB work; `acquire_timeout` bounds
        // how long a request waits for a pooled connection before failing
        // fast. Avoid logging `pg.url`: it may contain credentials.
        let connect_options =
            PgConnectOptions::from_str(&pg.url).map_err(|err| StoreError::Unexpected(err.into()))?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        // Handlers assume the schema exists; a migration failure is a
        // startup failure, not a degraded-serving mode.
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        Ok(Self { pool })
    }

    #[cfg(feature = "pg-tests")]
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn create_room(&self, room: Room) -> StoreResult<Room> {
        sqlx::query(
            r#"INSERT INTO rooms (id, name, capacity, description, floor, building, equipment, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(room.id)
        .bind(&room.name)
        .bind(room.capacity)
        .bind(&room.description)
        .bind(room.floor)
        .bind(&room.building)
        .bind(&room.equipment)
        .bind(room.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(room)
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let rows = sqlx::query_as::<_, DbRoom>(
            "SELECT id, name, capacity, description, floor, building, equipment, created_at
             FROM rooms ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(rows.into_iter().map(Room::from).collect())
    }

    async fn get_room(&self, room_id: Uuid) -> StoreResult<Room> {
        let row = sqlx::query_as::<_, DbRoom>(
            "SELECT id, name, capacity, description, floor, building, equipment, created_at
             FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        row.map(Room::from)
            .ok_or_else(|| StoreError::NotFound("room".into()))
    }

    async fn available_rooms(&self, range: &TimeRange) -> StoreResult<Vec<Room>> {
        // Same three-way predicate as the conflict check, inverted: rooms
        // with at least one intersecting booking (any user) are excluded.
        let rows = sqlx::query_as::<_, DbRoom>(
            r#"SELECT id, name, capacity, description, floor, building, equipment, created_at
               FROM rooms
               WHERE id NOT IN (
                   SELECT DISTINCT room_id FROM bookings
                   WHERE (start_time <= $1 AND end_time > $1)
                      OR (start_time < $2 AND end_time >= $2)
                      OR (start_time >= $1 AND end_time <= $2)
               )
               ORDER BY name"#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(rows.into_iter().map(Room::from).collect())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let insert = sqlx::query(
            r#"INSERT INTO users (id, name, email, password, phone, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.phone)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;
        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(StoreError::Conflict("email already registered".into()));
            }
            return Err(StoreError::Unexpected(err.into()));
        }
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, password, phone, created_at FROM users ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, password, phone, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        row.map(User::from)
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> StoreResult<User> {
        let updated = sqlx::query_as::<_, DbUser>(
            r#"UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   password = COALESCE($4, password),
                   phone = COALESCE($5, phone)
               WHERE id = $1
               RETURNING id, name, email, password, phone, created_at"#,
        )
        .bind(user_id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.password)
        .bind(&patch.phone)
        .fetch_optional(&self.pool)
        .await;
        match updated {
            Ok(Some(row)) => Ok(User::from(row)),
            Ok(None) => Err(StoreError::NotFound("user".into())),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("email already registered".into()))
            }
            Err(err) => Err(StoreError::Unexpected(err.into())),
        }
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(
            "DELETE FROM users WHERE id = $1
             RETURNING id, name, email, password, phone, created_at",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        row.map(User::from)
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn rooms_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Room>> {
        if !self.user_exists(user_id).await? {
            return Err(StoreError::NotFound("user".into()));
        }
        let rows = sqlx::query_as::<_, DbRoom>(
            r#"SELECT DISTINCT r.id, r.name, r.capacity, r.description, r.floor,
                      r.building, r.equipment, r.created_at
               FROM rooms r
               JOIN bookings b ON b.room_id = r.id
               WHERE b.user_id = $1
               ORDER BY r.name"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(rows.into_iter().map(Room::from).collect())
    }

    async fn create_booking(&self, booking: Booking) -> StoreResult<Booking> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        // Serialize check+insert per room. The advisory lock is transaction
        // scoped, so it releases on commit or rollback; concurrent creates
        // for different rooms are unaffected.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(booking.room_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        let conflicting = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM bookings
               WHERE room_id = $1
                 AND ((start_time <= $2 AND end_time > $2)
                   OR (start_time < $3 AND end_time >= $3)
                   OR (start_time >= $2 AND end_time <= $3))"#,
        )
        .bind(booking.room_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        if conflicting > 0 {
            return Err(StoreError::Conflict(
                "room already booked for this period".into(),
            ));
        }

        sqlx::query(
            r#"INSERT INTO bookings
               (id, room_id, user_id, start_time, end_time, status, title,
                description, attendees, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(booking.id)
        .bind(booking.room_id)
        .bind(booking.user_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status.as_str())
        .bind(&booking.title)
        .bind(&booking.description)
        .bind(booking.attendees)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;

        tx.commit()
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<BookingDetails> {
        let query = format!("{BOOKING_JOIN_SELECT} WHERE b.id = $1");
        let row = sqlx::query_as::<_, DbBookingJoin>(&query)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?
            .ok_or_else(|| StoreError::NotFound("booking".into()))?;
        let (booking, room, user) = row.split()?;
        Ok(BookingDetails {
            booking,
            room,
            user,
        })
    }

    async fn remove_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> StoreResult<Booking> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        // Row lock keeps the cutoff decision and the delete atomic.
        let row = sqlx::query_as::<_, DbBooking>(
            r#"SELECT id, room_id, user_id, start_time, end_time, status, title,
                      description, attendees, created_at, updated_at
               FROM bookings WHERE id = $1 FOR UPDATE"#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?
        .ok_or_else(|| StoreError::NotFound("booking".into()))?;
        let booking = Booking::try_from(row)?;

        if !booking
            .status
            .can_become(BookingStatus::Cancelled, &booking.range(), now)
        {
            return Err(StoreError::InvalidState(
                "booking has already started".into(),
            ));
        }

        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        tx.commit()
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(booking)
    }

    async fn bookings_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingWithRoom>> {
        let query = format!(
            "{BOOKING_JOIN_SELECT} WHERE b.user_id = $1 AND b.start_time >= $2 ORDER BY b.start_time"
        );
        let rows = sqlx::query_as::<_, DbBookingJoin>(&query)
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let (booking, room, _user) = row.split()?;
            out.push(BookingWithRoom { booking, room });
        }
        Ok(out)
    }

    async fn reminders_due(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>> {
        self.due_notifications(NotificationKind::Reminder, now, until)
            .await
    }

    async fn starts_due(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>> {
        self.due_notifications(NotificationKind::Start, since, now)
            .await
    }

    async fn mark_notified(&self, booking_id: Uuid, kind: NotificationKind) -> StoreResult<bool> {
        // ON CONFLICT DO NOTHING makes the claim idempotent: exactly one
        // caller (or scan run, or instance) observes rows_affected == 1.
        let result = sqlx::query(
            "INSERT INTO notification_marks (booking_id, kind) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(booking_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn room_exists(&self, room_id: Uuid) -> StoreResult<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms WHERE id = $1")
                .bind(room_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(count > 0)
    }

    async fn user_exists(&self, user_id: Uuid) -> StoreResult<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(count > 0)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

impl PostgresStore {
    /// Shared query for both scan kinds. The boundary semantics differ only
    /// in whether the lower edge is inclusive: reminders use `(from, to]`,
    /// start notices use `[from, to]`.
    async fn due_notifications(
        &self,
        kind: NotificationKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>> {
        let lower = match kind {
            NotificationKind::Reminder => "b.start_time > $1",
            NotificationKind::Start => "b.start_time >= $1",
        };
        let query = format!(
            r#"{BOOKING_JOIN_SELECT}
               WHERE b.status = 'confirmed'
                 AND {lower} AND b.start_time <= $2
                 AND NOT EXISTS (
                     SELECT 1 FROM notification_marks m
                     WHERE m.booking_id = b.id AND m.kind = $3
                 )
               ORDER BY b.start_time"#
        );
        let rows = sqlx::query_as::<_, DbBookingJoin>(&query)
            .bind(from)
            .bind(to)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let (booking, room, user) = row.split()?;
            out.push(BookingDetails {
                booking,
                room,
                user,
            });
        }
        Ok(out)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}
