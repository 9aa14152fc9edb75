//! Booking model, validated time intervals, and the overlap predicate.
//!
//! # Purpose
//! Defines the booking entity, its status state machine, and the half-open
//! `[start, end)` interval type whose intersection test is the single source
//! of truth for double-booking detection. Store backends must evaluate the
//! exact same predicate (`TimeRange::overlaps`) inside their conflict query.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::{Room, User};

/// Returned when an interval is inverted or zero-length.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time range: end must be strictly after start")]
pub struct InvalidTimeRange;

/// Half-open booking interval `[start, end)`.
///
/// # Invariants
/// - `end > start`; `TimeRange::new` rejects inverted and zero-length
///   intervals, so a constructed range is always well-formed.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a validated interval.
    ///
    /// # Errors
    /// - [`InvalidTimeRange`] if `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidTimeRange> {
        if end <= start {
            return Err(InvalidTimeRange);
        }
        Ok(Self { start, end })
    }

    /// Interval-intersection test for half-open ranges.
    ///
    /// True iff any of the three relationships hold:
    /// 1. `other` contains our start (`other.start <= start && other.end > start`)
    /// 2. `other` contains our end (`other.start < end && other.end >= end`)
    /// 3. we contain `other` entirely (`other.start >= start && other.end <= end`)
    ///
    /// Back-to-back intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        (other.start <= self.start && other.end > self.start)
            || (other.start < self.end && other.end >= self.end)
            || (other.start >= self.start && other.end <= self.end)
    }
}

/// Booking lifecycle state.
///
/// Transitions are guarded by [`BookingStatus::can_become`]; the status is
/// never a free-form string.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Whether the transition `self -> next` is legal at `now` for a booking
    /// occupying `range`.
    ///
    /// Only two transitions exist: a confirmed booking may be cancelled
    /// strictly before its start, and completed once its end has passed.
    pub fn can_become(self, next: BookingStatus, range: &TimeRange, now: DateTime<Utc>) -> bool {
        match (self, next) {
            (BookingStatus::Confirmed, BookingStatus::Cancelled) => now < range.start,
            (BookingStatus::Confirmed, BookingStatus::Completed) => now >= range.end,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

/// A room reservation for a time window.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Declared headcount; accepted as-is, not checked against room capacity.
    pub attendees: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The occupied interval. Fields come from a validated construction path
    /// (API boundary or schema constraint), so this cannot be inverted.
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Booking with its room attached, as returned by per-user listings.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithRoom {
    #[serde(flatten)]
    pub booking: Booking,
    pub room: Room,
}

/// Booking with both referenced entities attached.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub room: Room,
    pub user: User,
}

/// Which periodic scan a notification mark belongs to.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Pre-start reminder, sent inside the `(now, now + lead]` window.
    Reminder,
    /// Meeting-start notice, sent inside the `[now - lookback, now]` window.
    Start,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Start => "start",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reminder" => Some(NotificationKind::Reminder),
            "start" => Some(NotificationKind::Start),
            _ => None,
        }
    }
}
