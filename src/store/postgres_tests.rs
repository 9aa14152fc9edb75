//! Postgres store tests with real DB integration.
//!
//! # Purpose
//! Exercise the Postgres-backed store with real SQL to verify schema,
//! migrations, the atomic overlap check, and the notification mark claims.
//!
//! # How to use
//! Point ROOMBOOK_TEST_DATABASE_URL (or DATABASE_URL) at a scratch database
//! and run `cargo test --features pg-tests`. Tests are skipped when no URL is
//! configured. Each test truncates all tables, so never point this at data
//! you care about.
//!
//! These tests live in a separate module so coverage is attributed to the
//! production `postgres.rs` implementation.
#![cfg(feature = "pg-tests")]

use super::postgres::PostgresStore;
use super::{BookingStore, StoreError};
use crate::config::PostgresConfig;
use crate::model::{Booking, BookingStatus, NotificationKind, Room, TimeRange, User, UserPatch};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serial_test::serial;
use uuid::Uuid;

fn test_url() -> Option<String> {
    std::env::var("ROOMBOOK_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

async fn store() -> Option<PostgresStore> {
    let url = match test_url() {
        Some(url) => url,
        None => {
            eprintln!("skipping pg-tests: no test database URL configured");
            return None;
        }
    };
    let config = PostgresConfig {
        url,
        max_connections: 2,
        acquire_timeout_ms: 5_000,
    };
    let store = PostgresStore::connect(&config).await.expect("connect");
    sqlx::query("TRUNCATE notification_marks, bookings, users, rooms CASCADE")
        .execute(store.pool())
        .await
        .expect("truncate");
    Some(store)
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap()
}

fn room(name: &str) -> Room {
    Room {
        id: Uuid::new_v4(),
        name: name.to_string(),
        capacity: 8,
        description: None,
        floor: Some(2),
        building: None,
        equipment: vec!["projector".to_string()],
        created_at: Utc::now(),
    }
}

fn user(email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: "Mira".to_string(),
        email: email.to_string(),
        password: "secret".to_string(),
        phone: None,
        created_at: Utc::now(),
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
        title: Some("Planning".to_string()),
        description: None,
        attendees: Some(4),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
#[serial]
async fn postgres_store_full_roundtrip() {
    let Some(store) = store().await else { return };

    let room = store.create_room(room("Aurora")).await.expect("room");
    let user = store.create_user(user("mira@example.com")).await.expect("user");

    let created = store
        .create_booking(booking(room.id, user.id, at(9, 0), at(11, 0)))
        .await
        .expect("booking");
    let details = store.get_booking(created.id).await.expect("details");
    assert_eq!(details.room.id, room.id);
    assert_eq!(details.user.id, user.id);
    assert_eq!(details.booking.status, BookingStatus::Confirmed);

    let listed = store.list_rooms().await.expect("rooms");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].equipment, vec!["projector".to_string()]);
}

#[tokio::test]
#[serial]
async fn postgres_rejects_overlapping_booking() {
    let Some(store) = store().await else { return };

    let room = store.create_room(room("Aurora")).await.expect("room");
    let user = store.create_user(user("mira@example.com")).await.expect("user");
    store
        .create_booking(booking(room.id, user.id, at(9, 0), at(11, 0)))
        .await
        .expect("first booking");

    let err = store
        .create_booking(booking(room.id, user.id, at(10, 0), at(12, 0)))
        .await
        .err()
        .expect("overlap must fail");
    assert!(matches!(err, StoreError::Conflict(_)));

    // Adjacent interval shares only the boundary instant and is allowed.
    store
        .create_booking(booking(room.id, user.id, at(11, 0), at(12, 0)))
        .await
        .expect("adjacent booking");
}

#[tokio::test]
#[serial]
async fn postgres_cancellation_cutoff_is_strict() {
    let Some(store) = store().await else { return };

    let room = store.create_room(room("Aurora")).await.expect("room");
    let user = store.create_user(user("mira@example.com")).await.expect("user");
    let created = store
        .create_booking(booking(room.id, user.id, at(9, 0), at(11, 0)))
        .await
        .expect("booking");

    let err = store
        .remove_booking(created.id, at(9, 0))
        .await
        .err()
        .expect("started booking must not cancel");
    assert!(matches!(err, StoreError::InvalidState(_)));

    let removed = store
        .remove_booking(created.id, at(8, 59))
        .await
        .expect("future booking cancels");
    assert_eq!(removed.id, created.id);
}

#[tokio::test]
#[serial]
async fn postgres_duplicate_email_is_conflict() {
    let Some(store) = store().await else { return };

    store.create_user(user("mira@example.com")).await.expect("user");
    let err = store
        .create_user(user("mira@example.com"))
        .await
        .err()
        .expect("duplicate email must fail");
    assert!(matches!(err, StoreError::Conflict(_)));

    let other = store.create_user(user("noor@example.com")).await.expect("user");
    let err = store
        .update_user(
            other.id,
            UserPatch {
                email: Some("mira@example.com".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .err()
        .expect("update onto taken email must fail");
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
#[serial]
async fn postgres_notification_marks_claim_once() {
    let Some(store) = store().await else { return };

    let room = store.create_room(room("Aurora")).await.expect("room");
    let user = store.create_user(user("mira@example.com")).await.expect("user");
    let created = store
        .create_booking(booking(room.id, user.id, at(9, 0), at(11, 0)))
        .await
        .expect("booking");

    let due = store
        .reminders_due(at(8, 45), at(8, 45) + Duration::minutes(15))
        .await
        .expect("due");
    assert_eq!(due.len(), 1);

    assert!(store
        .mark_notified(created.id, NotificationKind::Reminder)
        .await
        .expect("claim"));
    assert!(!store
        .mark_notified(created.id, NotificationKind::Reminder)
        .await
        .expect("second claim"));

    // A claimed booking drops out of the due query entirely.
    let due = store
        .reminders_due(at(8, 45), at(8, 45) + Duration::minutes(15))
        .await
        .expect("due after claim");
    assert!(due.is_empty());

    // The start mark is tracked independently.
    assert!(store
        .mark_notified(created.id, NotificationKind::Start)
        .await
        .expect("start claim"));
}

#[tokio::test]
#[serial]
async fn postgres_availability_and_user_listings() {
    let Some(store) = store().await else { return };

    let room_a = store.create_room(room("Aurora")).await.expect("room a");
    let room_b = store.create_room(room("Boreal")).await.expect("room b");
    let user = store.create_user(user("mira@example.com")).await.expect("user");
    store
        .create_booking(booking(room_a.id, user.id, at(9, 0), at(11, 0)))
        .await
        .expect("booking");

    let range = TimeRange::new(at(9, 30), at(10, 30)).unwrap();
    let free = store.available_rooms(&range).await.expect("available");
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].id, room_b.id);

    let upcoming = store
        .bookings_for_user(user.id, at(8, 0))
        .await
        .expect("upcoming");
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].room.id, room_a.id);

    let rooms = store.rooms_for_user(user.id).await.expect("rooms");
    assert_eq!(rooms.len(), 1);
}
