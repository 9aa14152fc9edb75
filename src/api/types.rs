//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the booking REST API and OpenAPI schema
//! generation. JSON is camelCase throughout.
use crate::model::{BookingWithRoom, Room, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreateRequest {
    pub name: String,
    pub capacity: i32,
    pub description: Option<String>,
    pub floor: Option<i32>,
    pub building: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

/// Query window for the room availability search.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AvailableRoomsQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreateRequest {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub attendees: Option<i32>,
}

/// Body for the on-demand notification endpoint. `in_time` is the lead time
/// in minutes before the booking start; omitted means "at start".
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub in_time: Option<i64>,
}

/// Receipt describing a scheduled notification. This endpoint describes and
/// logs the dispatch; it does not send anything synchronously.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceipt {
    pub message: String,
    pub user: String,
    pub room: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomListResponse {
    pub items: Vec<Room>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserBookingsResponse {
    pub items: Vec<BookingWithRoom>,
}

/// Component health entry in the terminus-style health report.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health report: overall status plus per-component breakdowns. `info` holds
/// healthy components, `error` holds failing ones, `details` holds all.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub info: BTreeMap<String, ComponentHealth>,
    pub error: BTreeMap<String, ComponentHealth>,
    pub details: BTreeMap<String, ComponentHealth>,
}
