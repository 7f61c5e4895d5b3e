#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tempfile::TempDir;
use tourbook_api::{
    app,
    auth::Claims,
    config::AppConfig,
    db::{establish_connection_with_config, run_migrations, DbConfig, DbPool},
    entities::tour,
    handlers::AppServices,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// In-process application over a file-backed SQLite database, one per test.
/// Requests are driven through the production router with `oneshot`, so the
/// full middleware and extractor stack is exercised.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_momo_endpoint(None).await
    }

    /// Points the MoMo client at a mock server (wiremock) instead of the
    /// sandbox.
    pub async fn spawn_with_momo_endpoint(endpoint: Option<String>) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = db_dir.path().join("tourbook-test.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

        // A single connection keeps SQLite writes serialized.
        let db_config = DbConfig {
            url: db_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let db: DbPool = establish_connection_with_config(&db_config)
            .await
            .expect("connect test database");
        run_migrations(&db).await.expect("run migrations");
        let db = Arc::new(db);

        let mut config =
            AppConfig::new(db_url, TEST_JWT_SECRET.to_string(), "test".to_string());
        if let Some(endpoint) = endpoint {
            config.momo.endpoint = endpoint;
        }

        let services = AppServices::new(db.clone(), &config, None).expect("build services");
        let state = AppState {
            db,
            config,
            services,
        };

        TestApp {
            router: app(state.clone()),
            state,
            _db_dir: db_dir,
        }
    }

    /// Mints a bearer token the way the identity service would.
    pub fn token(&self, user_id: Uuid, agency_id: Option<Uuid>) -> String {
        let claims = Claims {
            sub: user_id,
            agency_id,
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("mint test token")
    }

    pub async fn seed_tour(
        &self,
        agency_id: Uuid,
        adult_price: Decimal,
        children_price: Decimal,
        discount: Option<Decimal>,
        pickup_points: &[&str],
    ) -> tour::Model {
        let points = if pickup_points.is_empty() {
            None
        } else {
            Some(serde_json::json!(pickup_points
                .iter()
                .map(|p| serde_json::json!({ "location": p }))
                .collect::<Vec<_>>()))
        };

        let now = Utc::now();
        tour::ActiveModel {
            id: Set(Uuid::new_v4()),
            agency_id: Set(agency_id),
            name: Set("Ha Long Bay day cruise".to_string()),
            is_active: Set(true),
            adult_price: Set(adult_price),
            children_price: Set(children_price),
            discount: Set(discount),
            pickup_points: Set(points),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed tour")
    }

    pub async fn deactivate_tour(&self, tour_id: Uuid) {
        use sea_orm::EntityTrait;
        let tour = tour::Entity::find_by_id(tour_id)
            .one(&*self.state.db)
            .await
            .expect("load tour")
            .expect("tour exists");
        let mut active: tour::ActiveModel = tour.into();
        active.is_active = Set(false);
        active.update(&*self.state.db).await.expect("update tour");
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("dispatch request");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn get(
        &self,
        uri: &str,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request("POST", uri, token, Some(body)).await
    }
}
