//! Storage abstraction for rooms, users, bookings, and notification marks.
//!
//! # Purpose
//! Defines the [`BookingStore`] trait shared by the in-memory and Postgres
//! backends, plus the error taxonomy handlers translate into HTTP responses.
//!
//! # Key invariants
//! - `create_booking` evaluates the overlap predicate and inserts atomically;
//!   two concurrent requests for the same room/window cannot both succeed.
//! - `remove_booking` checks the cancellation cutoff against the caller's
//!   `now` inside the same atomic unit as the delete.
//! - `mark_notified` is an idempotency claim: it returns `true` exactly once
//!   per `(booking, kind)` pair.
use crate::model::{
    Booking, BookingDetails, BookingWithRoom, NotificationKind, Room, TimeRange, User, UserPatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;
#[cfg(feature = "pg-tests")]
mod postgres_tests;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Uniqueness violated (duplicate email, overlapping booking).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Operation is illegal in the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_room(&self, room: Room) -> StoreResult<Room>;
    async fn list_rooms(&self) -> StoreResult<Vec<Room>>;
    async fn get_room(&self, room_id: Uuid) -> StoreResult<Room>;
    /// Rooms with zero bookings intersecting `range`, across all users.
    async fn available_rooms(&self, range: &TimeRange) -> StoreResult<Vec<Room>>;

    /// Fails with `Conflict` if the email is already registered.
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user(&self, user_id: Uuid) -> StoreResult<User>;
    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> StoreResult<User>;
    async fn delete_user(&self, user_id: Uuid) -> StoreResult<User>;
    /// Deduplicated rooms the user has ever booked.
    async fn rooms_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Room>>;

    /// Insert a booking unless it overlaps an existing one for the same room.
    /// The conflict check and the insert are a single atomic unit.
    async fn create_booking(&self, booking: Booking) -> StoreResult<Booking>;
    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<BookingDetails>;
    /// Delete a booking that has not started yet. Fails with `InvalidState`
    /// when `start_time <= now`.
    async fn remove_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> StoreResult<Booking>;
    /// Future bookings (`start_time >= now`) for a user, ascending by start,
    /// each with its room attached.
    async fn bookings_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingWithRoom>>;

    /// Confirmed bookings starting in `(now, until]` with no reminder mark.
    async fn reminders_due(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>>;
    /// Confirmed bookings starting in `[since, now]` with no start mark.
    async fn starts_due(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>>;
    /// Durably claim the `(booking, kind)` notification mark. Returns `false`
    /// if it was already claimed; callers must then skip dispatch.
    async fn mark_notified(&self, booking_id: Uuid, kind: NotificationKind) -> StoreResult<bool>;

    async fn room_exists(&self, room_id: Uuid) -> StoreResult<bool>;
    async fn user_exists(&self, user_id: Uuid) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
