use crate::{
    errors::ServiceError,
    services::momo::{IpnAck, IpnNotification},
    services::reconciliation::ReturnStatus,
    ApiResponse, AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/momo/ipn", post(momo_ipn))
        .route("/momo/return", get(momo_return))
}

/// Server-to-server instant payment notification from the provider.
/// Unauthenticated by design; the HMAC signature inside the body is the
/// authentication.
///
/// Apart from signature failures, every outcome answers with the provider's
/// acknowledgement shape: a malformed error surface here causes redelivery
/// storms.
#[utoipa::path(
    post,
    path = "/api/v1/payments/momo/ipn",
    request_body = IpnNotification,
    responses(
        (status = 200, description = "Notification acknowledged", body = IpnAck),
        (status = 400, description = "Body is not a well-formed notification"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "No payment matches the order id", body = IpnAck)
    ),
    tag = "webhooks"
)]
pub async fn momo_ipn(
    State(state): State<AppState>,
    payload: Result<Json<IpnNotification>, JsonRejection>,
) -> Response {
    let Json(notification) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "IPN body did not parse");
            return ServiceError::BadRequest(rejection.body_text()).into_response();
        }
    };
    match state
        .services
        .reconciliation
        .handle_ipn(notification.clone())
        .await
    {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e @ ServiceError::InvalidSignature) => e.into_response(),
        Err(e) => {
            warn!(order_id = %notification.order_id, error = %e, "IPN not applied");
            (
                e.status_code(),
                Json(IpnAck::rejected(&notification, &e.response_message())),
            )
                .into_response()
        }
    }
}

/// Browser redirect target after checkout. Read-only: reports where the
/// payment stands, settlement happens only through the IPN.
#[utoipa::path(
    get,
    path = "/api/v1/payments/momo/return",
    responses(
        (status = 200, description = "Current payment and booking status", body = ApiResponse<ReturnStatus>),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "No payment matches the order id")
    ),
    tag = "webhooks"
)]
pub async fn momo_return(
    State(state): State<AppState>,
    Query(params): Query<IpnNotification>,
) -> Result<Json<ApiResponse<ReturnStatus>>, ServiceError> {
    let status = state.services.reconciliation.verify_return(params).await?;
    Ok(Json(ApiResponse::ok(status)))
}
