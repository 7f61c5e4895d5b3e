use crate::{
    auth::AuthUser,
    entities::booking::BookingStatus,
    errors::ServiceError,
    services::bookings::{BookingResponse, CreateBookingRequest},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectBookingRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AgencyBookingsQuery {
    /// Restrict to one lifecycle state.
    pub status: Option<BookingStatus>,
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_my_bookings))
        .route("/:id", get(get_my_booking))
}

pub fn agency_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agency_bookings))
        .route("/:id", get(get_agency_booking))
        .route("/:id/approve", post(approve_booking))
        .route("/:id/reject", post(reject_booking))
}

/// Create a booking for a tour. The quoted total is snapshotted now.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "bookings",
    security(("bearer_auth" = []))
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), ServiceError> {
    let booking = state
        .services
        .bookings
        .create_booking(user.user_id, user.agency_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(booking))))
}

/// The calling customer's booking history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    responses(
        (status = 200, description = "Bookings for the calling customer", body = ApiResponse<Vec<BookingResponse>>)
    ),
    tag = "bookings",
    security(("bearer_auth" = []))
)]
pub async fn list_my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, ServiceError> {
    let bookings = state
        .services
        .bookings
        .list_for_customer(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking detail", body = ApiResponse<BookingResponse>),
        (status = 404, description = "Not found or owned by another customer")
    ),
    tag = "bookings",
    security(("bearer_auth" = []))
)]
pub async fn get_my_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state
        .services
        .bookings
        .get_for_customer(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// Incoming bookings for the tours the calling agency owns.
#[utoipa::path(
    get,
    path = "/api/v1/agency/bookings",
    params(AgencyBookingsQuery),
    responses(
        (status = 200, description = "Bookings for the agency's tours", body = ApiResponse<Vec<BookingResponse>>),
        (status = 403, description = "Caller is not an agency account")
    ),
    tag = "agency",
    security(("bearer_auth" = []))
)]
pub async fn list_agency_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AgencyBookingsQuery>,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, ServiceError> {
    let agency_id = user.require_agency()?;
    let bookings = state
        .services
        .bookings
        .list_for_agency(agency_id, query.status)
        .await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

#[utoipa::path(
    get,
    path = "/api/v1/agency/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking detail", body = ApiResponse<BookingResponse>),
        (status = 404, description = "Not found or not on this agency's tours")
    ),
    tag = "agency",
    security(("bearer_auth" = []))
)]
pub async fn get_agency_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let agency_id = user.require_agency()?;
    let booking = state
        .services
        .bookings
        .get_for_agency(id, agency_id)
        .await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// Approve a pending booking, opening the payment window.
#[utoipa::path(
    post,
    path = "/api/v1/agency/bookings/{id}/approve",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking moved to paid_waiting", body = ApiResponse<BookingResponse>),
        (status = 403, description = "Booking is not on this agency's tours"),
        (status = 409, description = "Booking is not pending")
    ),
    tag = "agency",
    security(("bearer_auth" = []))
)]
pub async fn approve_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let agency_id = user.require_agency()?;
    let booking = state.services.bookings.approve(id, agency_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// Reject a pending booking. A reason is mandatory.
#[utoipa::path(
    post,
    path = "/api/v1/agency/bookings/{id}/reject",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = RejectBookingRequest,
    responses(
        (status = 200, description = "Booking rejected", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Missing reason"),
        (status = 409, description = "Booking is not pending")
    ),
    tag = "agency",
    security(("bearer_auth" = []))
)]
pub async fn reject_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectBookingRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let agency_id = user.require_agency()?;
    let booking = state
        .services
        .bookings
        .reject(id, agency_id, request.reason)
        .await?;
    Ok(Json(ApiResponse::ok(booking)))
}
