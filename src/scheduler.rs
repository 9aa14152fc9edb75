//! Periodic notification scans.
//!
//! # Purpose
//! Two background loops run against the store: a reminder scan that looks
//! ahead for bookings starting soon, and a start scan that looks back over
//! the last tick for bookings that just began. Each due booking is claimed
//! through `mark_notified` before dispatch, so restarts and overlapping
//! windows never produce duplicate messages.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::model::NotificationKind;
use crate::notify::{reminder_message, start_message, Mailer};
use crate::store::BookingStore;

/// Spawn both scan loops. The handles are detached by the caller; the tasks
/// run until the process exits.
pub fn spawn_scans(
    store: Arc<dyn BookingStore>,
    mailer: Arc<dyn Mailer>,
    config: SchedulerConfig,
) -> Vec<JoinHandle<()>> {
    let reminder_store = Arc::clone(&store);
    let reminder_mailer = Arc::clone(&mailer);
    let lead = chrono::Duration::minutes(config.reminder_lead_minutes);
    let reminder = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.reminder_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let sent =
                run_reminder_scan(reminder_store.as_ref(), reminder_mailer.as_ref(), Utc::now(), lead)
                    .await;
            if sent > 0 {
                tracing::info!(sent, "reminder scan dispatched notifications");
            }
        }
    });

    let lookback = chrono::Duration::seconds(config.start_lookback_secs);
    let start = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.start_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let sent = run_start_scan(store.as_ref(), mailer.as_ref(), Utc::now(), lookback).await;
            if sent > 0 {
                tracing::info!(sent, "start scan dispatched notifications");
            }
        }
    });

    vec![reminder, start]
}

/// One reminder pass over the `(now, now + lead]` window. Returns how many
/// messages were dispatched.
pub async fn run_reminder_scan(
    store: &dyn BookingStore,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
    lead: chrono::Duration,
) -> usize {
    let due = match store.reminders_due(now, now + lead).await {
        Ok(due) => due,
        Err(err) => {
            counter!("roombook_scan_errors_total", "kind" => "reminder").increment(1);
            tracing::warn!(error = %err, "reminder scan query failed");
            return 0;
        }
    };
    let mut sent = 0;
    for details in due {
        let claimed = match store
            .mark_notified(details.booking.id, NotificationKind::Reminder)
            .await
        {
            Ok(claimed) => claimed,
            Err(err) => {
                counter!("roombook_scan_errors_total", "kind" => "reminder").increment(1);
                tracing::warn!(booking_id = %details.booking.id, error = %err, "reminder claim failed");
                continue;
            }
        };
        if !claimed {
            continue;
        }
        let (subject, body) = reminder_message(&details.booking, &details.room, &details.user);
        match mailer.send(&details.user.email, &subject, &body).await {
            Ok(()) => {
                counter!("roombook_notifications_sent_total", "kind" => "reminder").increment(1);
                sent += 1;
            }
            Err(err) => {
                counter!("roombook_scan_errors_total", "kind" => "reminder").increment(1);
                tracing::warn!(booking_id = %details.booking.id, error = %err, "reminder delivery failed");
            }
        }
    }
    sent
}

/// One start-notice pass over the `[now - lookback, now]` window.
pub async fn run_start_scan(
    store: &dyn BookingStore,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
    lookback: chrono::Duration,
) -> usize {
    let due = match store.starts_due(now - lookback, now).await {
        Ok(due) => due,
        Err(err) => {
            counter!("roombook_scan_errors_total", "kind" => "start").increment(1);
            tracing::warn!(error = %err, "start scan query failed");
            return 0;
        }
    };
    let mut sent = 0;
    for details in due {
        let claimed = match store
            .mark_notified(details.booking.id, NotificationKind::Start)
            .await
        {
            Ok(claimed) => claimed,
            Err(err) => {
                counter!("roombook_scan_errors_total", "kind" => "start").increment(1);
                tracing::warn!(booking_id = %details.booking.id, error = %err, "start claim failed");
                continue;
            }
        };
        if !claimed {
            continue;
        }
        let (subject, body) = start_message(&details.booking, &details.room, &details.user);
        match mailer.send(&details.user.email, &subject, &body).await {
            Ok(()) => {
                counter!("roombook_notifications_sent_total", "kind" => "start").increment(1);
                sent += 1;
            }
            Err(err) => {
                counter!("roombook_scan_errors_total", "kind" => "start").increment(1);
                tracing::warn!(booking_id = %details.booking.id, error = %err, "start delivery failed");
            }
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Booking, BookingStatus, Room, User};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        fn subjects(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, s)| s.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    async fn seed_booking(
        store: &InMemoryStore,
        email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Booking {
        let room = store
            .create_room(Room {
                id: Uuid::new_v4(),
                name: "Aurora".to_string(),
                capacity: 8,
                description: None,
                floor: None,
                building: None,
                equipment: Vec::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let user = store
            .create_user(User {
                id: Uuid::new_v4(),
                name: "Mira".to_string(),
                email: email.to_string(),
                password: "secret".to_string(),
                phone: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .create_booking(Booking {
                id: Uuid::new_v4(),
                room_id: room.id,
                user_id: user.id,
                start_time: start,
                end_time: end,
                status: BookingStatus::Confirmed,
                title: Some("Standup".to_string()),
                description: None,
                attendees: Some(3),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn reminder_fires_inside_lead_window() {
        let store = InMemoryStore::new();
        seed_booking(&store, "mira@example.com", at(9, 0), at(10, 0)).await;
        let mailer = RecordingMailer::default();

        let sent =
            run_reminder_scan(&store, &mailer, at(8, 45), chrono::Duration::minutes(15)).await;
        assert_eq!(sent, 1);
        assert!(mailer.subjects()[0].contains("15 minutes"));
    }

    #[tokio::test]
    async fn reminder_not_sent_twice_across_scans() {
        let store = InMemoryStore::new();
        seed_booking(&store, "mira@example.com", at(9, 0), at(10, 0)).await;
        let mailer = RecordingMailer::default();
        let lead = chrono::Duration::minutes(15);

        assert_eq!(run_reminder_scan(&store, &mailer, at(8, 45), lead).await, 1);
        // Overlapping window on the next tick; the mark suppresses a resend.
        assert_eq!(run_reminder_scan(&store, &mailer, at(8, 50), lead).await, 0);
        assert_eq!(mailer.subjects().len(), 1);
    }

    #[tokio::test]
    async fn reminder_skips_bookings_outside_window() {
        let store = InMemoryStore::new();
        seed_booking(&store, "mira@example.com", at(10, 0), at(11, 0)).await;
        let mailer = RecordingMailer::default();

        let sent =
            run_reminder_scan(&store, &mailer, at(8, 45), chrono::Duration::minutes(15)).await;
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn start_notice_fires_at_start_and_only_once() {
        let store = InMemoryStore::new();
        seed_booking(&store, "mira@example.com", at(9, 0), at(10, 0)).await;
        let mailer = RecordingMailer::default();
        let lookback = chrono::Duration::seconds(60);

        assert_eq!(run_start_scan(&store, &mailer, at(9, 0), lookback).await, 1);
        assert!(mailer.subjects()[0].contains("starting now"));
        // The next tick's window still covers 09:00; the mark suppresses it.
        assert_eq!(run_start_scan(&store, &mailer, at(9, 1), lookback).await, 0);
    }

    struct FlakyMailer {
        reject: String,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
            if to == self.reject {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivery_failure_does_not_block_the_rest_of_the_batch() {
        let store = InMemoryStore::new();
        seed_booking(&store, "mira@example.com", at(9, 0), at(10, 0)).await;
        seed_booking(&store, "noor@example.com", at(9, 0), at(10, 0)).await;
        let mailer = FlakyMailer {
            reject: "mira@example.com".to_string(),
            sent: Mutex::new(Vec::new()),
        };
        let lead = chrono::Duration::minutes(15);

        let sent = run_reminder_scan(&store, &mailer, at(8, 45), lead).await;
        assert_eq!(sent, 1);
        assert_eq!(
            *mailer.sent.lock().unwrap(),
            vec!["noor@example.com".to_string()]
        );

        // The failed booking's mark was claimed before the send, so the next
        // scan does not retry it and nothing new goes out.
        assert_eq!(run_reminder_scan(&store, &mailer, at(8, 46), lead).await, 0);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reminder_and_start_marks_are_independent() {
        let store = InMemoryStore::new();
        seed_booking(&store, "mira@example.com", at(9, 0), at(10, 0)).await;
        let mailer = RecordingMailer::default();

        assert_eq!(
            run_reminder_scan(&store, &mailer, at(8, 45), chrono::Duration::minutes(15)).await,
            1
        );
        assert_eq!(
            run_start_scan(&store, &mailer, at(9, 0), chrono::Duration::seconds(60)).await,
            1
        );
        assert_eq!(mailer.subjects().len(), 2);
    }
}
