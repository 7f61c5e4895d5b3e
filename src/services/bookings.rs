use crate::{
    entities::booking::{
        self, ActiveModel as BookingActiveModel, BookingStatus, Entity as BookingEntity,
        Model as BookingModel,
    },
    entities::tour::{self, Entity as TourEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    pub tour_id: Uuid,
    pub travel_date: NaiveDate,
    #[validate(range(min = 1, message = "At least one adult is required"))]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[validate(length(min = 1, message = "Pickup point is required"))]
    pub pickup_point: String,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub tour_id: Uuid,
    pub travel_date: NaiveDate,
    pub adults: i32,
    pub children: i32,
    pub pickup_point: String,
    pub note: Option<String>,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub booking_date: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
}

/// Outcome of applying a payment result to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeApplied {
    Applied,
    /// The booking was already in the matching terminal state; nothing was
    /// mutated. Duplicate webhook deliveries land here.
    AlreadyApplied,
}

/// Owns the booking lifecycle: creation, agency approval/rejection, and the
/// payment-driven finalization invoked by the reconciliation service.
#[derive(Clone)]
pub struct BookingService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl BookingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a booking in `pending`, snapshotting the price at this
    /// moment. Later tour price changes never touch existing bookings.
    #[instrument(skip(self, request), fields(customer_id = %customer_id, tour_id = %request.tour_id))]
    pub async fn create_booking(
        &self,
        customer_id: Uuid,
        acting_agency_id: Option<Uuid>,
        request: CreateBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let tour = TourEntity::find_by_id(request.tour_id)
            .one(&*self.db)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "tour_id: tour does not exist or is no longer on sale".to_string(),
                )
            })?;

        if acting_agency_id == Some(tour.agency_id) {
            return Err(ServiceError::ValidationError(
                "tour_id: you cannot book your own tour".to_string(),
            ));
        }

        if request.travel_date < Utc::now().date_naive() {
            return Err(ServiceError::ValidationError(
                "travel_date: departure date must be today or later".to_string(),
            ));
        }

        let pickup_locations = tour.pickup_locations();
        if !pickup_locations.is_empty() && !pickup_locations.contains(&request.pickup_point) {
            return Err(ServiceError::ValidationError(format!(
                "pickup_point: invalid pickup point, valid options: {:?}",
                pickup_locations
            )));
        }

        let total_price = pricing::compute_total(
            tour.adult_price,
            tour.children_price,
            tour.discount,
            request.adults,
            request.children,
        )
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let booking_id = Uuid::new_v4();

        let model = BookingActiveModel {
            id: Set(booking_id),
            customer_id: Set(customer_id),
            tour_id: Set(tour.id),
            travel_date: Set(request.travel_date),
            adults: Set(request.adults as i32),
            children: Set(request.children as i32),
            pickup_point: Set(request.pickup_point),
            note: Set(request.note),
            total_price: Set(total_price),
            status: Set(BookingStatus::Pending),
            booking_date: Set(now),
            approved_at: Set(None),
            paid_at: Set(None),
            rejected_at: Set(None),
            rejected_reason: Set(None),
            updated_at: Set(Some(now)),
        };

        let booking = model.insert(&*self.db).await.map_err(|e| {
            error!(error = %e, %booking_id, "failed to create booking");
            ServiceError::DatabaseError(e)
        })?;

        info!(%booking_id, %total_price, "booking created");

        self.emit(Event::BookingCreated {
            booking_id,
            customer_id,
            tour_id: tour.id,
            total_price,
        })
        .await;

        Ok(model_to_response(booking))
    }

    /// Agency approves a pending booking, moving it to `paid_waiting`.
    #[instrument(skip(self), fields(booking_id = %booking_id, agency_id = %acting_agency_id))]
    pub async fn approve(
        &self,
        booking_id: Uuid,
        acting_agency_id: Uuid,
    ) -> Result<BookingResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let booking = self
            .find_owned(&txn, booking_id, acting_agency_id)
            .await?;

        let now = Utc::now();
        // Atomic check-and-set: the status filter guards against a
        // concurrent approve/reject racing this one.
        let result = BookingEntity::update_many()
            .col_expr(booking::Column::Status, Expr::value(BookingStatus::PaidWaiting))
            .col_expr(booking::Column::ApprovedAt, Expr::value(Some(now)))
            .col_expr(
                booking::Column::RejectedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                booking::Column::RejectedReason,
                Expr::value(Option::<String>::None),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!(current = booking.status.as_str(), "approve on non-pending booking");
            return Err(ServiceError::Conflict(format!(
                "Booking is {}, expected pending",
                booking.status.as_str()
            )));
        }

        let updated = BookingEntity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;
        txn.commit().await?;

        info!("booking approved");
        self.emit(Event::BookingApproved { booking_id }).await;

        Ok(model_to_response(updated))
    }

    /// Agency rejects a pending booking with a mandatory reason.
    #[instrument(skip(self, reason), fields(booking_id = %booking_id, agency_id = %acting_agency_id))]
    pub async fn reject(
        &self,
        booking_id: Uuid,
        acting_agency_id: Uuid,
        reason: String,
    ) -> Result<BookingResponse, ServiceError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "reason: a rejection reason is required".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let booking = self
            .find_owned(&txn, booking_id, acting_agency_id)
            .await?;

        let now = Utc::now();
        let result = BookingEntity::update_many()
            .col_expr(booking::Column::Status, Expr::value(BookingStatus::Rejected))
            .col_expr(booking::Column::RejectedAt, Expr::value(Some(now)))
            .col_expr(booking::Column::RejectedReason, Expr::value(Some(reason.clone())))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!(current = booking.status.as_str(), "reject on non-pending booking");
            return Err(ServiceError::Conflict(format!(
                "Booking is {}, expected pending",
                booking.status.as_str()
            )));
        }

        let updated = BookingEntity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;
        txn.commit().await?;

        info!("booking rejected");
        self.emit(Event::BookingRejected { booking_id, reason }).await;

        Ok(model_to_response(updated))
    }

    /// Applies a payment outcome to a `paid_waiting` booking. Invoked only by
    /// the reconciliation service, inside that service's transaction, so the
    /// booking and payment mutations commit or roll back together.
    ///
    /// Re-applying the same outcome to a booking already in the matching
    /// terminal state is a no-op reporting `AlreadyApplied`; timestamps are
    /// never re-written.
    pub async fn apply_payment_outcome<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking_id: Uuid,
        success: bool,
        failure_reason: Option<String>,
    ) -> Result<OutcomeApplied, ServiceError> {
        let now = Utc::now();

        let update = if success {
            BookingEntity::update_many()
                .col_expr(booking::Column::Status, Expr::value(BookingStatus::Paid))
                .col_expr(booking::Column::PaidAt, Expr::value(Some(now)))
        } else {
            let reason = failure_reason.unwrap_or_else(|| "Payment failed".to_string());
            BookingEntity::update_many()
                .col_expr(booking::Column::Status, Expr::value(BookingStatus::Rejected))
                .col_expr(booking::Column::RejectedAt, Expr::value(Some(now)))
                .col_expr(booking::Column::RejectedReason, Expr::value(Some(reason)))
        };

        let result = update
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::PaidWaiting))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            return Ok(OutcomeApplied::Applied);
        }

        let booking = BookingEntity::find_by_id(booking_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;

        let expected = if success {
            BookingStatus::Paid
        } else {
            BookingStatus::Rejected
        };
        if booking.status == expected {
            return Ok(OutcomeApplied::AlreadyApplied);
        }

        Err(ServiceError::Conflict(format!(
            "Booking is {}, expected paid_waiting",
            booking.status.as_str()
        )))
    }

    /// A customer's booking, scoped so other customers get a 404.
    pub async fn get_for_customer(
        &self,
        booking_id: Uuid,
        customer_id: Uuid,
    ) -> Result<BookingResponse, ServiceError> {
        let booking = BookingEntity::find_by_id(booking_id)
            .filter(booking::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;
        Ok(model_to_response(booking))
    }

    /// Customer booking history, newest first.
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<BookingResponse>, ServiceError> {
        let bookings = BookingEntity::find()
            .filter(booking::Column::CustomerId.eq(customer_id))
            .order_by_desc(booking::Column::BookingDate)
            .all(&*self.db)
            .await?;
        Ok(bookings.into_iter().map(model_to_response).collect())
    }

    /// Incoming bookings for the tours an agency owns, optionally filtered
    /// by status.
    pub async fn list_for_agency(
        &self,
        agency_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingResponse>, ServiceError> {
        let mut query = BookingEntity::find()
            .inner_join(TourEntity)
            .filter(tour::Column::AgencyId.eq(agency_id));
        if let Some(status) = status {
            query = query.filter(booking::Column::Status.eq(status));
        }
        let bookings = query
            .order_by_desc(booking::Column::BookingDate)
            .all(&*self.db)
            .await?;
        Ok(bookings.into_iter().map(model_to_response).collect())
    }

    /// Agency view of a single booking, scoped by tour ownership.
    pub async fn get_for_agency(
        &self,
        booking_id: Uuid,
        agency_id: Uuid,
    ) -> Result<BookingResponse, ServiceError> {
        let booking = BookingEntity::find_by_id(booking_id)
            .inner_join(TourEntity)
            .filter(tour::Column::AgencyId.eq(agency_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;
        Ok(model_to_response(booking))
    }

    /// Loads the booking and checks the acting agency owns its tour.
    /// Permission failures happen before any mutation.
    async fn find_owned<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking_id: Uuid,
        acting_agency_id: Uuid,
    ) -> Result<BookingModel, ServiceError> {
        let booking = BookingEntity::find_by_id(booking_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;

        let tour = TourEntity::find_by_id(booking.tour_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Tour not found".to_string()))?;

        if tour.agency_id != acting_agency_id {
            return Err(ServiceError::Forbidden(
                "You do not manage this booking".to_string(),
            ));
        }

        Ok(booking)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send booking event");
            }
        }
    }
}

fn model_to_response(model: BookingModel) -> BookingResponse {
    BookingResponse {
        id: model.id,
        customer_id: model.customer_id,
        tour_id: model.tour_id,
        travel_date: model.travel_date,
        adults: model.adults,
        children: model.children,
        pickup_point: model.pickup_point,
        note: model.note,
        total_price: model.total_price,
        status: model.status,
        booking_date: model.booking_date,
        approved_at: model.approved_at,
        paid_at: model.paid_at,
        rejected_at: model.rejected_at,
        rejected_reason: model.rejected_reason,
    }
}
