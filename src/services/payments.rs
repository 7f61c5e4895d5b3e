use crate::{
    entities::booking::{self, BookingStatus, Entity as BookingEntity},
    entities::payment::{
        self, ActiveModel as PaymentActiveModel, Entity as PaymentEntity, Model as PaymentModel,
        PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::momo::{MomoClient, PROVIDER_NAME},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub provider: String,
    pub provider_order_id: Option<String>,
    pub provider_txn: Option<String>,
    pub status: PaymentStatus,
    pub pay_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Manages the payment record attached to a booking and drives the gateway
/// handshake. The booking's `total_price` is the single source of truth for
/// the charge amount.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    momo: Arc<MomoClient>,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        momo: Arc<MomoClient>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            momo,
            event_sender,
        }
    }

    /// Starts (or resumes) payment for an approved booking and returns the
    /// provider redirect URL.
    ///
    /// Repeated calls are safe: the per-booking payment row is reused, and
    /// when a gateway handshake already produced a `pay_url` the existing one
    /// is returned without contacting the provider again.
    #[instrument(skip(self), fields(booking_id = %booking_id, customer_id = %customer_id))]
    pub async fn init_payment(
        &self,
        booking_id: Uuid,
        customer_id: Uuid,
    ) -> Result<PaymentResponse, ServiceError> {
        let booking = BookingEntity::find_by_id(booking_id)
            .filter(booking::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;

        match booking.status {
            BookingStatus::PaidWaiting => {}
            BookingStatus::Paid => {
                return Err(ServiceError::Conflict(
                    "Booking is already paid".to_string(),
                ))
            }
            BookingStatus::Pending => {
                return Err(ServiceError::Conflict(
                    "Booking is pending, awaiting agency approval".to_string(),
                ))
            }
            BookingStatus::Rejected => {
                return Err(ServiceError::Conflict(
                    "Booking was rejected and cannot be paid".to_string(),
                ))
            }
        }

        let mut payment = self.get_or_create(booking_id, booking.total_price).await?;

        match payment.status {
            PaymentStatus::Success => {
                return Err(ServiceError::Conflict(
                    "Payment already succeeded for this booking".to_string(),
                ))
            }
            PaymentStatus::Failed => {
                return Err(ServiceError::Conflict(
                    "Payment already failed for this booking".to_string(),
                ))
            }
            PaymentStatus::Pending | PaymentStatus::Processing => {}
        }

        // Historical rows can drift from the booking snapshot; the booking
        // price always wins, and the correction is persisted even when the
        // existing handshake is reused below.
        if payment.amount != booking.total_price {
            warn!(
                payment_id = %payment.id,
                payment_amount = %payment.amount,
                booking_amount = %booking.total_price,
                "correcting payment amount to booking snapshot"
            );
            let mut active: PaymentActiveModel = payment.clone().into();
            active.amount = Set(booking.total_price);
            active.updated_at = Set(Some(Utc::now()));
            payment = active.update(&*self.db).await?;
        }

        // A handshake already in flight keeps its URL; the provider rejects
        // a second create for the same orderId anyway.
        if payment.status == PaymentStatus::Processing && payment.pay_url.is_some() {
            info!(payment_id = %payment.id, "reusing existing pay_url");
            return Ok(model_to_response(payment));
        }

        let mut active: PaymentActiveModel = payment.clone().into();

        let order_info = format!("Tour booking {}", booking_id);
        let outcome = self
            .momo
            .create_payment(booking.total_price, &order_info)
            .await?;

        let now = Utc::now();
        active.provider_order_id = Set(Some(outcome.order_id));
        active.request_id = Set(Some(outcome.request_id));
        active.pay_url = Set(Some(outcome.pay_url));
        active.extra_data = Set(Some(outcome.raw_response));
        active.status = Set(PaymentStatus::Processing);
        active.updated_at = Set(Some(now));
        let updated = active.update(&*self.db).await?;

        info!(payment_id = %updated.id, "payment initiated");
        self.emit(Event::PaymentInitiated {
            payment_id: updated.id,
            booking_id,
            amount: updated.amount,
        })
        .await;

        Ok(model_to_response(updated))
    }

    /// The payment record for a customer's booking.
    pub async fn get_for_booking(
        &self,
        booking_id: Uuid,
        customer_id: Uuid,
    ) -> Result<PaymentResponse, ServiceError> {
        BookingEntity::find_by_id(booking_id)
            .filter(booking::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;

        let payment = PaymentEntity::find()
            .filter(payment::Column::BookingId.eq(booking_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payment not found".to_string()))?;

        Ok(model_to_response(payment))
    }

    /// Insert-then-reread: the UNIQUE constraint on `booking_id` turns a
    /// concurrent double-init into one winner plus one re-read, with no
    /// advisory locking.
    async fn get_or_create(
        &self,
        booking_id: Uuid,
        amount: Decimal,
    ) -> Result<PaymentModel, ServiceError> {
        if let Some(existing) = PaymentEntity::find()
            .filter(payment::Column::BookingId.eq(booking_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = PaymentActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking_id),
            amount: Set(amount),
            provider: Set(PROVIDER_NAME.to_string()),
            provider_order_id: Set(None),
            request_id: Set(None),
            provider_txn: Set(None),
            status: Set(PaymentStatus::Pending),
            pay_url: Set(None),
            extra_data: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        match model.insert(&*self.db).await {
            Ok(created) => Ok(created),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // Lost the race; the winner's row is ours to reuse.
                PaymentEntity::find()
                    .filter(payment::Column::BookingId.eq(booking_id))
                    .one(&*self.db)
                    .await?
                    .ok_or(ServiceError::DatabaseError(e))
            }
            Err(e) => Err(ServiceError::DatabaseError(e)),
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send payment event");
            }
        }
    }
}

pub(crate) fn model_to_response(model: PaymentModel) -> PaymentResponse {
    PaymentResponse {
        id: model.id,
        booking_id: model.booking_id,
        amount: model.amount,
        provider: model.provider,
        provider_order_id: model.provider_order_id,
        provider_txn: model.provider_txn,
        status: model.status,
        pay_url: model.pay_url,
        paid_at: model.paid_at,
        created_at: model.created_at,
    }
}
