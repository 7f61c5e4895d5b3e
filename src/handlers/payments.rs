use crate::{
    auth::AuthUser, errors::ServiceError, services::payments::PaymentResponse, ApiResponse,
    AppState,
};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:id/payment", get(get_payment).post(init_payment))
}

/// Start (or resume) payment for an approved booking. Returns the provider
/// redirect URL the customer completes checkout at.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/payment",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Payment initiated, pay_url ready", body = ApiResponse<PaymentResponse>),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not awaiting payment"),
        (status = 502, description = "Payment provider unreachable or misbehaving")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn init_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    let payment = state
        .services
        .payments
        .init_payment(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(payment)))
}

/// The payment record for one of the caller's bookings.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}/payment",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Payment record", body = ApiResponse<PaymentResponse>),
        (status = 404, description = "Booking or payment not found")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    let payment = state
        .services
        .payments
        .get_for_booking(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(payment)))
}
