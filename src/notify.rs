//! Outbound notification delivery.
//!
//! The scheduler composes messages for upcoming and starting bookings and
//! hands them to a [`Mailer`]. The default implementation only logs; a real
//! deployment would plug in an SMTP or push gateway behind the same trait.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Booking, Room, User};

/// Delivery backend for booking notifications.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Logs every message at info level instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, body, "notification dispatched");
        Ok(())
    }
}

fn format_start(start: DateTime<Utc>) -> String {
    start.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn title_of(booking: &Booking) -> &str {
    booking.title.as_deref().unwrap_or("Your booking")
}

/// Subject and body for the advance reminder sent before a booking starts.
pub fn reminder_message(booking: &Booking, room: &Room, user: &User) -> (String, String) {
    let subject = format!("Reminder: {} starts in 15 minutes", title_of(booking));
    let body = format!(
        "Hi {}, your booking \"{}\" in room {} starts at {}.",
        user.name,
        title_of(booking),
        room.name,
        format_start(booking.start_time),
    );
    (subject, body)
}

/// Subject and body for the notice sent when a booking begins.
pub fn start_message(booking: &Booking, room: &Room, user: &User) -> (String, String) {
    let subject = format!("{} is starting now", title_of(booking));
    let body = format!(
        "Hi {}, your booking \"{}\" in room {} started at {}.",
        user.name,
        title_of(booking),
        room.name,
        format_start(booking.start_time),
    );
    (subject, body)
}
