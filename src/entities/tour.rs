use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only pricing/availability snapshot of a tour. Tour CRUD lives in the
/// catalog service; the booking core only consumes these columns.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tours")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Agency that owns and operates the tour; used for the self-booking
    /// check and for approve/reject authorization.
    pub agency_id: Uuid,

    pub name: String,
    pub is_active: bool,

    pub adult_price: Decimal,
    pub children_price: Decimal,

    /// Percentage discount (0-100), absent when no promotion is running.
    pub discount: Option<Decimal>,

    /// JSON array of `{"location": ...}` objects a customer may pick from.
    pub pickup_points: Option<Json>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Pickup locations declared on the tour, if any.
    pub fn pickup_locations(&self) -> Vec<String> {
        self.pickup_points
            .as_ref()
            .and_then(|v| v.as_array())
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| p.get("location"))
                    .filter_map(|l| l.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
