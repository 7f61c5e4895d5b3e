use crate::{
    entities::{booking::BookingStatus, payment::PaymentStatus},
    errors::ErrorResponse,
    handlers,
    services::bookings::{BookingResponse, CreateBookingRequest},
    services::momo::{IpnAck, IpnNotification},
    services::payments::PaymentResponse,
    services::reconciliation::ReturnStatus,
    ApiResponse,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::bookings::create_booking,
        handlers::bookings::list_my_bookings,
        handlers::bookings::get_my_booking,
        handlers::bookings::list_agency_bookings,
        handlers::bookings::get_agency_booking,
        handlers::bookings::approve_booking,
        handlers::bookings::reject_booking,
        handlers::payments::init_payment,
        handlers::payments::get_payment,
        handlers::webhooks::momo_ipn,
        handlers::webhooks::momo_return,
    ),
    components(schemas(
        ApiResponse<BookingResponse>,
        ApiResponse<Vec<BookingResponse>>,
        ApiResponse<PaymentResponse>,
        ApiResponse<ReturnStatus>,
        BookingResponse,
        BookingStatus,
        CreateBookingRequest,
        handlers::bookings::RejectBookingRequest,
        PaymentResponse,
        PaymentStatus,
        IpnNotification,
        IpnAck,
        ReturnStatus,
        ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "bookings", description = "Customer booking lifecycle"),
        (name = "agency", description = "Agency review of incoming bookings"),
        (name = "payments", description = "Payment initiation and lookup"),
        (name = "webhooks", description = "Provider callbacks")
    ),
    info(
        title = "Tourbook API",
        description = "Tour booking and payment reconciliation service"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
