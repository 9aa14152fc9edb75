//! In-memory implementation of the booking store.
//!
//! # Purpose
//! Implements [`BookingStore`] entirely in memory using `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: mutations take write locks, reads take
//!   read locks. The overlap check and the insert for `create_booking` happen
//!   under one write lock on the bookings map, so concurrent creates for the
//!   same room/window serialize and exactly one wins.
//!
//! # Metrics
//! Entity-count gauges are kept in step with the durable backend so dashboards
//! behave the same regardless of storage selection.
use super::{BookingStore, StoreError, StoreResult};
use crate::model::{
    Booking, BookingDetails, BookingStatus, BookingWithRoom, NotificationKind, Room, TimeRange,
    User, UserPatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory booking store.
///
/// ## Data structures
/// - Authoritative state lives in `HashMap`s keyed by entity id.
/// - Notification marks live in a `HashSet<(booking_id, kind)>`; insertion
///   doubles as the exactly-once claim.
///
/// Everything is wrapped in `Arc<RwLock<...>>` so the store can be shared
/// across async request handlers and the scheduler tasks.
pub struct InMemoryStore {
    rooms: Arc<RwLock<HashMap<Uuid, Room>>>,
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    /// Bookings map also serializes the overlap-check-then-insert pair:
    /// holding its write lock across both steps closes the race a naive
    /// check-then-insert would leave open.
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
    notified: Arc<RwLock<HashSet<(Uuid, NotificationKind)>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
            bookings: Arc::new(RwLock::new(HashMap::new())),
            notified: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Attach room (and user) records to a booking for detail responses.
    async fn details(&self, booking: Booking) -> StoreResult<BookingDetails> {
        let rooms = self.rooms.read().await;
        let users = self.users.read().await;
        let room = rooms
            .get(&booking.room_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("room".into()))?;
        let user = users
            .get(&booking.user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        Ok(BookingDetails {
            booking,
            room,
            user,
        })
    }

    async fn due_in_window(
        &self,
        kind: NotificationKind,
        in_window: impl Fn(DateTime<Utc>) -> bool,
    ) -> StoreResult<Vec<BookingDetails>> {
        let candidates: Vec<Booking> = {
            let bookings = self.bookings.read().await;
            let notified = self.notified.read().await;
            let mut due: Vec<Booking> = bookings
                .values()
                .filter(|b| b.status == BookingStatus::Confirmed)
                .filter(|b| in_window(b.start_time))
                .filter(|b| !notified.contains(&(b.id, kind)))
                .cloned()
                .collect();
            due.sort_by_key(|b| b.start_time);
            due
        };
        let mut out = Vec::with_capacity(candidates.len());
        for booking in candidates {
            out.push(self.details(booking).await?);
        }
        Ok(out)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn create_room(&self, room: Room) -> StoreResult<Room> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id, room.clone());
        metrics::gauge!("roombook_rooms_total").set(rooms.len() as f64);
        Ok(room)
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self.rooms.read().await.values().cloned().collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    async fn get_room(&self, room_id: Uuid) -> StoreResult<Room> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("room".into()))
    }

    async fn available_rooms(&self, range: &TimeRange) -> StoreResult<Vec<Room>> {
        // Same shape as the SQL plan: collect room ids with at least one
        // conflicting booking, then return every room not in that set.
        let booked: HashSet<Uuid> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| range.overlaps(&b.range()))
            .map(|b| b.room_id)
            .collect();
        let mut free: Vec<Room> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|room| !booked.contains(&room.id))
            .cloned()
            .collect();
        free.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(free)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        users.insert(user.id, user.clone());
        metrics::gauge!("roombook_users_total").set(users.len() as f64);
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if let Some(email) = &patch.email {
            if users.values().any(|u| u.id != user_id && &u.email == email) {
                return Err(StoreError::Conflict("email already registered".into()));
            }
        }
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(password) = patch.password {
            user.password = password;
        }
        if let Some(phone) = patch.phone {
            user.phone = Some(phone);
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .remove(&user_id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        metrics::gauge!("roombook_users_total").set(users.len() as f64);
        Ok(user)
    }

    async fn rooms_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Room>> {
        if !self.users.read().await.contains_key(&user_id) {
            return Err(StoreError::NotFound("user".into()));
        }
        let room_ids: HashSet<Uuid> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.room_id)
            .collect();
        let rooms = self.rooms.read().await;
        let mut out: Vec<Room> = room_ids
            .into_iter()
            .filter_map(|id| rooms.get(&id).cloned())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn create_booking(&self, booking: Booking) -> StoreResult<Booking> {
        // Write lock held across check and insert: the conflict test and the
        // insert are one atomic unit with respect to other creates.
        let mut bookings = self.bookings.write().await;
        let candidate = booking.range();
        let conflict = bookings
            .values()
            .filter(|existing| existing.room_id == booking.room_id)
            .any(|existing| candidate.overlaps(&existing.range()));
        if conflict {
            return Err(StoreError::Conflict(
                "room already booked for this period".into(),
            ));
        }
        bookings.insert(booking.id, booking.clone());
        metrics::gauge!("roombook_bookings_total").set(bookings.len() as f64);
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<BookingDetails> {
        let booking = self
            .bookings
            .read()
            .await
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("booking".into()))?;
        self.details(booking).await
    }

    async fn remove_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> StoreResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("booking".into()))?;
        // Cutoff is evaluated at call time through the status machine:
        // only a confirmed booking strictly before its start may go away.
        if !booking
            .status
            .can_become(BookingStatus::Cancelled, &booking.range(), now)
        {
            return Err(StoreError::InvalidState(
                "booking has already started".into(),
            ));
        }
        bookings.remove(&booking_id);
        metrics::gauge!("roombook_bookings_total").set(bookings.len() as f64);
        Ok(booking)
    }

    async fn bookings_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingWithRoom>> {
        let mut future: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id && b.start_time >= now)
            .cloned()
            .collect();
        future.sort_by_key(|b| b.start_time);
        let rooms = self.rooms.read().await;
        let mut out = Vec::with_capacity(future.len());
        for booking in future {
            let room = rooms
                .get(&booking.room_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound("room".into()))?;
            out.push(BookingWithRoom { booking, room });
        }
        Ok(out)
    }

    async fn reminders_due(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>> {
        // Window is (now, until]: a booking starting exactly at the far edge
        // is included, one starting right now is the start scan's business.
        self.due_in_window(NotificationKind::Reminder, |start| {
            start > now && start <= until
        })
        .await
    }

    async fn starts_due(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingDetails>> {
        self.due_in_window(NotificationKind::Start, |start| {
            start >= since && start <= now
        })
        .await
    }

    async fn mark_notified(&self, booking_id: Uuid, kind: NotificationKind) -> StoreResult<bool> {
        Ok(self.notified.write().await.insert((booking_id, kind)))
    }

    async fn room_exists(&self, room_id: Uuid) -> StoreResult<bool> {
        Ok(self.rooms.read().await.contains_key(&room_id))
    }

    async fn user_exists(&self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.users.read().await.contains_key(&user_id))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, hour, minute, 0).unwrap()
    }

    fn room(name: &str) -> Room {
        Room {
            id: Uuid::new_v4(),
            name: name.to_string(),
            capacity: 10,
            description: None,
            floor: None,
            building: None,
            equipment: Vec::new(),
            created_at: at(0, 0),
        }
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Olena".to_string(),
            email: email.to_string(),
            password: "secret".to_string(),
            phone: None,
            created_at: at(0, 0),
        }
    }

    fn booking(room_id: Uuid, user_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            room_id,
            user_id,
            start_time: start,
            end_time: end,
            status: BookingStatus::Confirmed,
            title: None,
            description: None,
            attendees: None,
            created_at: at(0, 0),
            updated_at: at(0, 0),
        }
    }

    async fn seeded() -> (InMemoryStore, Room, User) {
        let store = InMemoryStore::new();
        let room = store.create_room(room("Room A")).await.expect("room");
        let user = store.create_user(user("olena@example.com")).await.expect("user");
        (store, room, user)
    }

    #[tokio::test]
    async fn overlapping_booking_is_rejected() {
        let (store, room, user) = seeded().await;
        store
            .create_booking(booking(room.id, user.id, at(9, 0), at(11, 0)))
            .await
            .expect("first booking");

        // 10:00-12:00 starts inside the existing window.
        let err = store
            .create_booking(booking(room.id, user.id, at(10, 0), at(12, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // 08:00-12:00 swallows the existing window.
        let err = store
            .create_booking(booking(room.id, user.id, at(8, 0), at(12, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // 11:00-12:00 is back-to-back and fine.
        store
            .create_booking(booking(room.id, user.id, at(11, 0), at(12, 0)))
            .await
            .expect("adjacent booking");
    }

    #[tokio::test]
    async fn duplicate_window_is_rejected_on_second_submit() {
        let (store, room, user) = seeded().await;
        let first = booking(room.id, user.id, at(9, 0), at(10, 0));
        store.create_booking(first).await.expect("first");
        let err = store
            .create_booking(booking(room.id, user.id, at(9, 0), at(10, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn same_window_in_another_room_is_fine() {
        let (store, room_a, user) = seeded().await;
        let room_b = store.create_room(room("Room B")).await.expect("room b");
        store
            .create_booking(booking(room_a.id, user.id, at(9, 0), at(11, 0)))
            .await
            .expect("room a");
        store
            .create_booking(booking(room_b.id, user.id, at(9, 0), at(11, 0)))
            .await
            .expect("room b");
    }

    #[tokio::test]
    async fn available_rooms_excludes_conflicting_room() {
        let (store, room_a, user) = seeded().await;
        let room_b = store.create_room(room("Room B")).await.expect("room b");
        store
            .create_booking(booking(room_a.id, user.id, at(9, 0), at(11, 0)))
            .await
            .expect("booking");

        let window = TimeRange::new(at(9, 30), at(10, 30)).expect("range");
        let free = store.available_rooms(&window).await.expect("available");
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].id, room_b.id);
    }

    #[tokio::test]
    async fn removal_cutoff_is_strict() {
        let (store, room, user) = seeded().await;
        let future = store
            .create_booking(booking(room.id, user.id, at(9, 0), at(10, 0)))
            .await
            .expect("booking");

        // One second past start: too late.
        let err = store
            .remove_booking(future.id, at(9, 0) + chrono::Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));

        // One second before start: fine, and the deleted record comes back.
        let removed = store
            .remove_booking(future.id, at(9, 0) - chrono::Duration::seconds(1))
            .await
            .expect("remove");
        assert_eq!(removed.id, future.id);

        let err = store.remove_booking(future.id, at(0, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn bookings_for_user_are_future_only_and_sorted() {
        let (store, room, user) = seeded().await;
        store
            .create_booking(booking(room.id, user.id, at(7, 0), at(8, 0)))
            .await
            .expect("past");
        store
            .create_booking(booking(room.id, user.id, at(14, 0), at(15, 0)))
            .await
            .expect("later");
        store
            .create_booking(booking(room.id, user.id, at(11, 0), at(12, 0)))
            .await
            .expect("sooner");

        let upcoming = store
            .bookings_for_user(user.id, at(10, 0))
            .await
            .expect("list");
        let starts: Vec<DateTime<Utc>> =
            upcoming.iter().map(|b| b.booking.start_time).collect();
        assert_eq!(starts, vec![at(11, 0), at(14, 0)]);
        assert!(upcoming.iter().all(|b| b.room.id == room.id));
    }

    #[tokio::test]
    async fn rooms_for_user_deduplicates() {
        let (store, room_a, user) = seeded().await;
        store
            .create_booking(booking(room_a.id, user.id, at(9, 0), at(10, 0)))
            .await
            .expect("one");
        store
            .create_booking(booking(room_a.id, user.id, at(10, 0), at(11, 0)))
            .await
            .expect("two");

        let rooms = store.rooms_for_user(user.id).await.expect("rooms");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, room_a.id);

        let err = store.rooms_for_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (store, _room, existing) = seeded().await;
        let err = store
            .create_user(user("olena@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let other = store.create_user(user("ivan@example.com")).await.expect("user");
        let err = store
            .update_user(
                other.id,
                UserPatch {
                    email: Some(existing.email.clone()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn reminder_window_boundaries_are_half_open() {
        let (store, room_a, user) = seeded().await;
        // Starts exactly at the far edge of (08:45, 09:00]: included.
        store
            .create_booking(booking(room_a.id, user.id, at(9, 0), at(10, 0)))
            .await
            .expect("edge");
        // Starts exactly at `now`: excluded from the reminder window.
        let room_b = store.create_room(room("Room B")).await.expect("room b");
        store
            .create_booking(booking(room_b.id, user.id, at(8, 45), at(9, 30)))
            .await
            .expect("now");

        let due = store.reminders_due(at(8, 45), at(9, 0)).await.expect("due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].booking.start_time, at(9, 0));
    }

    #[tokio::test]
    async fn mark_notified_claims_exactly_once() {
        let (store, room, user) = seeded().await;
        let b = store
            .create_booking(booking(room.id, user.id, at(9, 0), at(10, 0)))
            .await
            .expect("booking");

        assert!(store
            .mark_notified(b.id, NotificationKind::Reminder)
            .await
            .expect("claim"));
        assert!(!store
            .mark_notified(b.id, NotificationKind::Reminder)
            .await
            .expect("reclaim"));
        // Marks are per kind: the start notice claim is independent.
        assert!(store
            .mark_notified(b.id, NotificationKind::Start)
            .await
            .expect("start claim"));

        // Once claimed, the scan query no longer selects the booking.
        let due = store.reminders_due(at(8, 45), at(9, 0)).await.expect("due");
        assert!(due.is_empty());
    }
}
