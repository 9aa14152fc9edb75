//! Booking API handlers.
//!
//! # Purpose
//! Implements the booking lifecycle endpoints: create (existence checks then
//! the atomic overlap-checked insert), lookup with attached entities, removal
//! under the cancellation cutoff, and the on-demand notification receipt.
use crate::api::error::{
    api_bad_request, api_internal, api_not_found, api_validation_error, ApiError,
};
use crate::api::types::{BookingCreateRequest, NotificationReceipt, NotificationRequest};
use crate::api::{ensure_room_exists, ensure_user_exists};
use crate::app::AppState;
use crate::model::{Booking, BookingDetails, BookingStatus, TimeRange};
use crate::store::StoreError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/v1/bookings",
    tag = "bookings",
    request_body = BookingCreateRequest,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "Invalid interval or room unavailable", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Room or user not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_booking(
    State(state): State<AppState>,
    Json(body): Json<BookingCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let range = TimeRange::new(body.start_time, body.end_time)
        .map_err(|err| api_validation_error(&err.to_string()))?;
    if let Some(attendees) = body.attendees {
        if attendees < 1 {
            return Err(api_validation_error("attendees must be at least 1"));
        }
    }
    ensure_room_exists(&state, body.room_id).await?;
    ensure_user_exists(&state, body.user_id).await?;

    let now = Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        room_id: body.room_id,
        user_id: body.user_id,
        start_time: range.start,
        end_time: range.end,
        status: BookingStatus::Confirmed,
        title: body.title,
        description: body.description,
        attendees: body.attendees,
        created_at: now,
        updated_at: now,
    };
    match state.store.create_booking(booking).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(StoreError::Conflict(_)) => Err(api_bad_request(
            "room_unavailable",
            "room already booked for this period",
        )),
        Err(err) => Err(api_internal("failed to create booking", &err)),
    }
}

#[utoipa::path(
    get,
    path = "/v1/bookings/{id}",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking identifier")),
    responses(
        (status = 200, description = "Booking with user and room attached", body = BookingDetails),
        (status = 404, description = "Booking not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_booking(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BookingDetails>, ApiError> {
    match state.store.get_booking(id).await {
        Ok(details) => Ok(Json(details)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("booking not found")),
        Err(err) => Err(api_internal("failed to fetch booking", &err)),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/bookings/{id}",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking identifier")),
    responses(
        (status = 200, description = "Deleted booking", body = Booking),
        (status = 400, description = "Booking already started", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_booking(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Booking>, ApiError> {
    // Cutoff is evaluated at call time, inside the store's atomic unit.
    match state.store.remove_booking(id, Utc::now()).await {
        Ok(deleted) => Ok(Json(deleted)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("booking not found")),
        Err(StoreError::InvalidState(_)) => Err(api_bad_request(
            "booking_started",
            "cannot cancel a booking that has already started",
        )),
        Err(err) => Err(api_internal("failed to delete booking", &err)),
    }
}

#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/notifications",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking identifier")),
    request_body = NotificationRequest,
    responses(
        (status = 200, description = "Notification receipt", body = NotificationReceipt),
        (status = 400, description = "Invalid lead time", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn schedule_notification(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<NotificationRequest>,
) -> Result<Json<NotificationReceipt>, ApiError> {
    if let Some(lead) = body.in_time {
        if lead < 0 {
            return Err(api_validation_error("lead time must be non-negative"));
        }
    }
    let details = match state.store.get_booking(id).await {
        Ok(details) => details,
        Err(StoreError::NotFound(_)) => return Err(api_not_found("booking not found")),
        Err(err) => return Err(api_internal("failed to fetch booking", &err)),
    };

    // Describe the planned dispatch; this path never sends mail itself.
    let start = details.booking.start_time;
    let notification_time = match body.in_time {
        // `in_time` is client-supplied; minutes past what a TimeDelta or the
        // timestamp itself can hold must come back as a 400, not a panic.
        Some(lead) => Duration::try_minutes(lead)
            .and_then(|offset| start.checked_sub_signed(offset))
            .ok_or_else(|| api_validation_error("lead time is out of range"))?,
        None => start,
    };
    tracing::info!(
        user = %details.user.email,
        room = %details.room.name,
        at = %notification_time.to_rfc3339(),
        "scheduling booking notification"
    );
    Ok(Json(NotificationReceipt {
        message: format!("notification scheduled for {}", notification_time.to_rfc3339()),
        user: details.user.email,
        room: details.room.name,
        start_time: start,
    }))
}
