use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment settlement lifecycle. `Success` and `Failed` are terminal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Row exists but the gateway handshake has not completed.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Gateway accepted the request; awaiting the IPN outcome.
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// The 1:1 financial record tracking a booking's settlement attempt.
/// `booking_id` carries a UNIQUE constraint: at most one payment per booking
/// is enforced by the database, not by application convention.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub booking_id: Uuid,

    /// Always equals the booking's `total_price` at creation; corrected
    /// before reuse if historical data drifted.
    pub amount: Decimal,

    /// Payment integration identifier, e.g. "momo".
    pub provider: String,

    /// Merchant-assigned order id echoed back by the provider; the IPN
    /// correlation key. Unique once assigned.
    #[sea_orm(unique)]
    pub provider_order_id: Option<String>,

    /// Merchant-assigned id of the gateway create request.
    pub request_id: Option<String>,

    /// Provider-side transaction id reported by the IPN.
    pub provider_txn: Option<String>,

    pub status: PaymentStatus,

    /// Redirect URL for the customer to complete payment; absent until the
    /// gateway call succeeds.
    pub pay_url: Option<String>,

    /// Last raw provider response/notification, kept for audit.
    pub extra_data: Option<Json>,

    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
