//! Booking-service data model module.
//!
//! # Purpose
//! Re-exports the room/user/booking models, the validated time interval, and
//! the notification payloads used by the API, store, and scheduler layers.
mod booking;
mod room;
mod user;

pub use booking::{
    Booking, BookingDetails, BookingStatus, BookingWithRoom, InvalidTimeRange, NotificationKind,
    TimeRange,
};
pub use room::Room;
pub use user::{User, UserPatch};
