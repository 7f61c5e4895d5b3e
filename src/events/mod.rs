use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted after a state change has committed. Consumers
/// (notification delivery, agency dashboards) react to these with their own
/// retry policies; a lost notification never rolls back the core transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        booking_id: Uuid,
        customer_id: Uuid,
        tour_id: Uuid,
        total_price: Decimal,
    },
    BookingApproved {
        booking_id: Uuid,
    },
    BookingRejected {
        booking_id: Uuid,
        reason: String,
    },
    BookingPaid {
        booking_id: Uuid,
    },
    PaymentInitiated {
        payment_id: Uuid,
        booking_id: Uuid,
        amount: Decimal,
    },
    PaymentSucceeded {
        payment_id: Uuid,
        booking_id: Uuid,
    },
    PaymentFailed {
        payment_id: Uuid,
        booking_id: Uuid,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Failures are reported to the caller,
    /// which logs and moves on; event delivery is fire-and-forget.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Consumes events and performs notification dispatch. Email/websocket
/// delivery plugs in here; today each event is logged so operators can trace
/// the lifecycle end to end.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::BookingCreated {
                booking_id,
                customer_id,
                total_price,
                ..
            } => {
                info!(%booking_id, %customer_id, %total_price, "booking created, notifying agency");
            }
            Event::BookingApproved { booking_id } => {
                info!(%booking_id, "booking approved, notifying customer");
            }
            Event::BookingRejected { booking_id, reason } => {
                info!(%booking_id, %reason, "booking rejected, notifying customer");
            }
            Event::BookingPaid { booking_id } => {
                info!(%booking_id, "booking paid, notifying customer and agency");
            }
            Event::PaymentInitiated {
                payment_id,
                booking_id,
                amount,
            } => {
                info!(%payment_id, %booking_id, %amount, "payment initiated");
            }
            Event::PaymentSucceeded {
                payment_id,
                booking_id,
            } => {
                info!(%payment_id, %booking_id, "payment succeeded");
            }
            Event::PaymentFailed {
                payment_id,
                booking_id,
                reason,
            } => {
                info!(%payment_id, %booking_id, %reason, "payment failed");
            }
        }
    }
}
