//! OpenAPI schema aggregation for the booking API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.
use crate::api::{
    bookings, rooms, system, users,
    types::{
        AvailableRoomsQuery, BookingCreateRequest, ComponentHealth, ErrorResponse, HealthResponse,
        NotificationReceipt, NotificationRequest, RoomCreateRequest, RoomListResponse,
        UserBookingsResponse, UserCreateRequest, UserListResponse,
    },
};
use crate::model::{
    Booking, BookingDetails, BookingStatus, BookingWithRoom, Room, TimeRange, User, UserPatch,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "roombook",
        version = "v1",
        description = "Room booking HTTP API"
    ),
    paths(
        system::health,
        rooms::list_rooms,
        rooms::create_room,
        rooms::available_rooms,
        rooms::get_room,
        bookings::create_booking,
        bookings::get_booking,
        bookings::delete_booking,
        bookings::schedule_notification,
        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::user_bookings,
        users::user_rooms
    ),
    components(schemas(
        ErrorResponse,
        HealthResponse,
        ComponentHealth,
        Room,
        RoomCreateRequest,
        RoomListResponse,
        AvailableRoomsQuery,
        User,
        UserCreateRequest,
        UserPatch,
        UserListResponse,
        UserBookingsResponse,
        Booking,
        BookingStatus,
        BookingCreateRequest,
        BookingDetails,
        BookingWithRoom,
        TimeRange,
        NotificationRequest,
        NotificationReceipt
    )),
    tags(
        (name = "system", description = "Health and probes"),
        (name = "rooms", description = "Room management and availability"),
        (name = "bookings", description = "Booking lifecycle and notifications"),
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;
