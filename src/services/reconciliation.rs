use crate::{
    entities::booking::{BookingStatus, Entity as BookingEntity},
    entities::payment::{self, Entity as PaymentEntity, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::bookings::{BookingService, OutcomeApplied},
    services::momo::{self, IpnAck, IpnNotification, MomoClient},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Read-only status report for the customer-facing redirect after checkout.
/// The IPN is the only channel that mutates state; this just tells the
/// customer where things stand.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnStatus {
    pub booking_id: Uuid,
    pub order_id: String,
    pub provider_result_code: i64,
    pub provider_message: String,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
}

/// Applies asynchronous provider notifications (IPNs) to the payment and
/// booking records. Every apply is idempotent: redelivered notifications
/// acknowledge without mutating.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DatabaseConnection>,
    bookings: BookingService,
    momo: Arc<MomoClient>,
    event_sender: Option<Arc<EventSender>>,
}

impl ReconciliationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        bookings: BookingService,
        momo: Arc<MomoClient>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            bookings,
            momo,
            event_sender,
        }
    }

    /// Verifies, correlates and applies one IPN. The payment and booking
    /// mutations share a transaction; the conditional UPDATE on the
    /// payment's non-terminal status is the serialization point against
    /// concurrent redeliveries.
    #[instrument(skip(self, n), fields(order_id = %n.order_id, result_code = n.result_code))]
    pub async fn handle_ipn(&self, n: IpnNotification) -> Result<IpnAck, ServiceError> {
        if !momo::verify_ipn(self.momo.config(), &n) {
            warn!("IPN signature verification failed");
            return Err(ServiceError::InvalidSignature);
        }

        let payment = PaymentEntity::find()
            .filter(payment::Column::ProviderOrderId.eq(n.order_id.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                warn!("IPN for unknown order id");
                ServiceError::NotFound("No payment matches this order".to_string())
            })?;

        let success = n.is_success();

        // The signature covers the amount, so a mismatch here means the
        // provider and our record genuinely disagree. Refuse to settle.
        if success && !amount_matches(payment.amount, n.amount) {
            error!(
                payment_id = %payment.id,
                expected = %payment.amount,
                got = n.amount,
                "IPN amount does not match payment record"
            );
            return Err(ServiceError::BadRequest(
                "Notification amount does not match the payment record".to_string(),
            ));
        }

        // Terminal payments acknowledge without reapplying. A redelivered
        // outcome is the expected no-op; a *conflicting* outcome is an
        // anomaly, but answering non-2xx would make the provider redeliver
        // it forever, so it is logged loudly and acknowledged too. The
        // settled state is never overwritten.
        if payment.status.is_terminal() {
            let matches_current = (success && payment.status == PaymentStatus::Success)
                || (!success && payment.status == PaymentStatus::Failed);
            if matches_current {
                info!(payment_id = %payment.id, "duplicate IPN, already applied");
            } else {
                error!(
                    payment_id = %payment.id,
                    current = payment.status.as_str(),
                    result_code = n.result_code,
                    "IPN outcome conflicts with settled payment, acknowledging without applying"
                );
            }
            return Ok(IpnAck::accepted(&n));
        }

        let txn = self.db.begin().await?;

        let now = Utc::now();
        let target = if success {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };
        let raw = serde_json::to_value(&n).map_err(|e| ServiceError::Other(e.into()))?;

        let mut update = PaymentEntity::update_many()
            .col_expr(payment::Column::Status, Expr::value(target))
            .col_expr(
                payment::Column::ProviderTxn,
                Expr::value(Some(n.trans_id.to_string())),
            )
            .col_expr(payment::Column::ExtraData, Expr::value(Some(raw)))
            .col_expr(payment::Column::UpdatedAt, Expr::value(Some(now)));
        if success {
            update = update.col_expr(payment::Column::PaidAt, Expr::value(Some(now)));
        }
        let result = update
            .filter(payment::Column::Id.eq(payment.id))
            .filter(
                payment::Column::Status
                    .is_in([PaymentStatus::Pending, PaymentStatus::Processing]),
            )
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            // A concurrent delivery settled the payment between our read
            // and the update. Re-check what it settled to; either way the
            // answer is an ack, never a retry-inducing error.
            txn.rollback().await?;
            let current = PaymentEntity::find_by_id(payment.id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Payment not found".to_string()))?;
            if current.status == target {
                info!(payment_id = %payment.id, "concurrent IPN already applied");
            } else {
                error!(
                    payment_id = %payment.id,
                    current = current.status.as_str(),
                    result_code = n.result_code,
                    "IPN outcome conflicts with concurrently settled payment, acknowledging without applying"
                );
            }
            return Ok(IpnAck::accepted(&n));
        }

        let failure_reason = if success {
            None
        } else {
            Some(format!("Payment failed: {}", n.message))
        };
        let applied = self
            .bookings
            .apply_payment_outcome(&txn, payment.booking_id, success, failure_reason.clone())
            .await?;

        txn.commit().await?;

        info!(
            payment_id = %payment.id,
            booking_id = %payment.booking_id,
            status = target.as_str(),
            "IPN applied"
        );

        if success {
            self.emit(Event::PaymentSucceeded {
                payment_id: payment.id,
                booking_id: payment.booking_id,
            })
            .await;
            if applied == OutcomeApplied::Applied {
                self.emit(Event::BookingPaid {
                    booking_id: payment.booking_id,
                })
                .await;
            }
        } else {
            self.emit(Event::PaymentFailed {
                payment_id: payment.id,
                booking_id: payment.booking_id,
                reason: n.message.clone(),
            })
            .await;
            if applied == OutcomeApplied::Applied {
                self.emit(Event::BookingRejected {
                    booking_id: payment.booking_id,
                    reason: failure_reason.unwrap_or_else(|| "Payment failed".to_string()),
                })
                .await;
            }
        }

        Ok(IpnAck::accepted(&n))
    }

    /// Handles the browser redirect after checkout. Signature-verified but
    /// strictly advisory: the customer may never come back, so nothing here
    /// writes. State comes from whatever the IPN has (or has not) applied.
    #[instrument(skip(self, n), fields(order_id = %n.order_id))]
    pub async fn verify_return(&self, n: IpnNotification) -> Result<ReturnStatus, ServiceError> {
        if !momo::verify_ipn(self.momo.config(), &n) {
            warn!("return redirect signature verification failed");
            return Err(ServiceError::InvalidSignature);
        }

        let payment = PaymentEntity::find()
            .filter(payment::Column::ProviderOrderId.eq(n.order_id.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No payment matches this order".to_string()))?;

        let booking = BookingEntity::find_by_id(payment.booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;

        Ok(ReturnStatus {
            booking_id: booking.id,
            order_id: n.order_id,
            provider_result_code: n.result_code,
            provider_message: n.message,
            payment_status: payment.status,
            booking_status: booking.status,
        })
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send reconciliation event");
            }
        }
    }
}

/// Provider amounts are integral currency units; our records keep two
/// decimal places. Equal means equal after truncation with no fractional
/// remainder.
fn amount_matches(recorded: Decimal, notified: i64) -> bool {
    recorded == Decimal::from(notified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_comparison_normalizes_scale() {
        assert!(amount_matches(dec!(2250000.00), 2_250_000));
        assert!(amount_matches(dec!(2250000), 2_250_000));
        assert!(!amount_matches(dec!(2250000.50), 2_250_000));
        assert!(!amount_matches(dec!(2250001.00), 2_250_000));
    }
}
