//! Room model definition.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A bookable room.
///
/// Capacity is a positive headcount; `attendees` on a booking is *not*
/// validated against it (current behavior, kept deliberately).
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub description: Option<String>,
    pub floor: Option<i32>,
    pub building: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub created_at: DateTime<Utc>,
}
