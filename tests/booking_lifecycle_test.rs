mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

fn future_date() -> String {
    (Utc::now() + Duration::days(30))
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

async fn create_booking(
    app: &TestApp,
    customer_token: &str,
    tour_id: Uuid,
) -> serde_json::Value {
    let (status, body) = app
        .post(
            "/api/v1/bookings",
            Some(customer_token),
            json!({
                "tour_id": tour_id,
                "travel_date": future_date(),
                "adults": 2,
                "children": 1,
                "pickup_point": "Opera House",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create booking: {body}");
    body["data"].clone()
}

#[tokio::test]
async fn booking_snapshots_price_at_creation() {
    let app = TestApp::spawn().await;
    let agency_id = Uuid::new_v4();
    let tour = app
        .seed_tour(
            agency_id,
            dec!(1000000),
            dec!(500000),
            Some(dec!(10)),
            &["Opera House", "Central Station"],
        )
        .await;

    let customer = Uuid::new_v4();
    let token = app.token(customer, None);
    let booking = create_booking(&app, &token, tour.id).await;

    // (2 x 1,000,000 + 1 x 500,000) minus 10%
    assert_eq!(booking["total_price"], "2250000.00");
    assert_eq!(booking["status"], "pending");
    assert!(booking["approved_at"].is_null());

    // Raising the tour price later must not touch the stored snapshot.
    {
        use sea_orm::{ActiveModelTrait, EntityTrait, Set};
        use tourbook_api::entities::tour;
        let model = tour::Entity::find_by_id(tour.id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: tour::ActiveModel = model.into();
        active.adult_price = Set(dec!(9000000));
        active.update(&*app.state.db).await.unwrap();
    }

    let id = booking["id"].as_str().unwrap();
    let (status, body) = app
        .get(&format!("/api/v1/bookings/{id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_price"], "2250000.00");
}

#[tokio::test]
async fn agency_approval_moves_booking_to_paid_waiting() {
    let app = TestApp::spawn().await;
    let agency_user = Uuid::new_v4();
    let agency_id = Uuid::new_v4();
    let tour = app
        .seed_tour(agency_id, dec!(1000000), dec!(500000), None, &["Opera House"])
        .await;

    let customer_token = app.token(Uuid::new_v4(), None);
    let booking = create_booking(&app, &customer_token, tour.id).await;
    let id = booking["id"].as_str().unwrap();

    let agency_token = app.token(agency_user, Some(agency_id));
    let (status, body) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/approve"),
            Some(&agency_token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "approve: {body}");
    assert_eq!(body["data"]["status"], "paid_waiting");
    assert!(!body["data"]["approved_at"].is_null());

    // Approving again conflicts: the booking is no longer pending.
    let (status, body) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/approve"),
            Some(&agency_token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "second approve: {body}");
}

#[tokio::test]
async fn rejection_requires_a_reason_and_is_terminal() {
    let app = TestApp::spawn().await;
    let agency_id = Uuid::new_v4();
    let tour = app
        .seed_tour(agency_id, dec!(800000), dec!(400000), None, &["Opera House"])
        .await;

    let customer_token = app.token(Uuid::new_v4(), None);
    let booking = create_booking(&app, &customer_token, tour.id).await;
    let id = booking["id"].as_str().unwrap();
    let agency_token = app.token(Uuid::new_v4(), Some(agency_id));

    let (status, _) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/reject"),
            Some(&agency_token),
            json!({ "reason": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/reject"),
            Some(&agency_token),
            json!({ "reason": "Fully booked on that date" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "reject: {body}");
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejected_reason"], "Fully booked on that date");
    assert!(!body["data"]["rejected_at"].is_null());

    // Terminal: a later approve must conflict, not resurrect the booking.
    let (status, _) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/approve"),
            Some(&agency_token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn approval_is_scoped_to_the_owning_agency() {
    let app = TestApp::spawn().await;
    let owner_agency = Uuid::new_v4();
    let tour = app
        .seed_tour(owner_agency, dec!(500000), dec!(250000), None, &["Opera House"])
        .await;

    let customer_token = app.token(Uuid::new_v4(), None);
    let booking = create_booking(&app, &customer_token, tour.id).await;
    let id = booking["id"].as_str().unwrap();

    let intruder_token = app.token(Uuid::new_v4(), Some(Uuid::new_v4()));
    let (status, _) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/approve"),
            Some(&intruder_token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The failed attempt must not have mutated anything.
    let (_, body) = app
        .get(&format!("/api/v1/bookings/{id}"), Some(&customer_token))
        .await;
    assert_eq!(body["data"]["status"], "pending");

    // A plain customer token is rejected before the ownership check.
    let customerish = app.token(Uuid::new_v4(), None);
    let (status, _) = app
        .post(
            &format!("/api/v1/agency/bookings/{id}/approve"),
            Some(&customerish),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_booking_validation_rules() {
    let app = TestApp::spawn().await;
    let agency_id = Uuid::new_v4();
    let agency_user = Uuid::new_v4();
    let tour = app
        .seed_tour(agency_id, dec!(1000000), dec!(500000), None, &["Opera House"])
        .await;

    let token = app.token(Uuid::new_v4(), None);

    // Past travel date.
    let (status, _) = app
        .post(
            "/api/v1/bookings",
            Some(&token),
            json!({
                "tour_id": tour.id,
                "travel_date": "2020-01-01",
                "adults": 2,
                "pickup_point": "Opera House",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Pickup point not offered by the tour.
    let (status, _) = app
        .post(
            "/api/v1/bookings",
            Some(&token),
            json!({
                "tour_id": tour.id,
                "travel_date": future_date(),
                "adults": 2,
                "pickup_point": "Airport",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Zero adults.
    let (status, _) = app
        .post(
            "/api/v1/bookings",
            Some(&token),
            json!({
                "tour_id": tour.id,
                "travel_date": future_date(),
                "adults": 0,
                "pickup_point": "Opera House",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The agency that owns the tour cannot book it.
    let owner_token = app.token(agency_user, Some(agency_id));
    let (status, _) = app
        .post(
            "/api/v1/bookings",
            Some(&owner_token),
            json!({
                "tour_id": tour.id,
                "travel_date": future_date(),
                "adults": 2,
                "pickup_point": "Opera House",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Inactive tours are not bookable.
    app.deactivate_tour(tour.id).await;
    let (status, _) = app
        .post(
            "/api/v1/bookings",
            Some(&token),
            json!({
                "tour_id": tour.id,
                "travel_date": future_date(),
                "adults": 2,
                "pickup_point": "Opera House",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No token at all.
    let (status, _) = app
        .post(
            "/api/v1/bookings",
            None,
            json!({
                "tour_id": tour.id,
                "travel_date": future_date(),
                "adults": 2,
                "pickup_point": "Opera House",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bookings_are_scoped_per_customer_and_per_agency() {
    let app = TestApp::spawn().await;
    let agency_id = Uuid::new_v4();
    let tour = app
        .seed_tour(agency_id, dec!(1000000), dec!(500000), None, &["Opera House"])
        .await;

    let alice = Uuid::new_v4();
    let alice_token = app.token(alice, None);
    let booking = create_booking(&app, &alice_token, tour.id).await;
    let id = booking["id"].as_str().unwrap();

    // Another customer sees neither the detail nor the listing entry.
    let mallory_token = app.token(Uuid::new_v4(), None);
    let (status, _) = app
        .get(&format!("/api/v1/bookings/{id}"), Some(&mallory_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/v1/bookings", Some(&mallory_token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (_, body) = app.get("/api/v1/bookings", Some(&alice_token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // The agency sees its incoming booking, filterable by status.
    let agency_token = app.token(Uuid::new_v4(), Some(agency_id));
    let (status, body) = app
        .get("/api/v1/agency/bookings?status=pending", Some(&agency_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = app
        .get("/api/v1/agency/bookings?status=paid", Some(&agency_token))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // An unrelated agency sees nothing.
    let other_agency_token = app.token(Uuid::new_v4(), Some(Uuid::new_v4()));
    let (_, body) = app
        .get("/api/v1/agency/bookings", Some(&other_agency_token))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}
