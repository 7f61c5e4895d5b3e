pub mod bookings;
pub mod payments;
pub mod webhooks;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    services::{
        bookings::BookingService, momo::MomoClient, payments::PaymentService,
        reconciliation::ReconciliationService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All wired-up services, shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub bookings: BookingService,
    pub payments: PaymentService,
    pub reconciliation: ReconciliationService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Result<Self, ServiceError> {
        let momo = Arc::new(MomoClient::new(config.momo.clone())?);
        let bookings = BookingService::new(db.clone(), event_sender.clone());
        let payments = PaymentService::new(db.clone(), momo.clone(), event_sender.clone());
        let reconciliation =
            ReconciliationService::new(db, bookings.clone(), momo, event_sender);
        Ok(Self {
            bookings,
            payments,
            reconciliation,
        })
    }
}
