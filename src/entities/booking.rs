use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Booking lifecycle. `Paid` and `Rejected` are terminal; no transition
/// leaves them.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created by the customer, awaiting agency review.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved by the agency, awaiting payment.
    #[sea_orm(string_value = "paid_waiting")]
    PaidWaiting,
    /// Payment confirmed by the provider IPN.
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Declined by the agency, or payment failed.
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaidWaiting => "paid_waiting",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub customer_id: Uuid,
    pub tour_id: Uuid,

    pub travel_date: NaiveDate,
    pub adults: i32,
    pub children: i32,
    pub pickup_point: String,
    pub note: Option<String>,

    /// Financial snapshot taken at creation; never recomputed, even when the
    /// tour's price or discount changes afterwards.
    pub total_price: Decimal,

    pub status: BookingStatus,

    pub booking_date: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    /// Required whenever `status` is `Rejected`, cleared otherwise.
    pub rejected_reason: Option<String>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tour::Entity",
        from = "Column::TourId",
        to = "super::tour::Column::Id"
    )]
    Tour,
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::tour::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tour.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
