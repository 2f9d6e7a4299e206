use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use car_rental_backend::config::Config;
use car_rental_backend::entities::booking::{self, BookingStatus};
use car_rental_backend::entities::car;
use car_rental_backend::entities::user::{self, UserRole};
use car_rental_backend::routes;
use car_rental_backend::services::messaging::SmsProvider;
use car_rental_backend::services::notifications::EmailProvider;
use car_rental_backend::services::payments::{
    signature, CheckoutSession, CheckoutSessionRequest, PaymentProvider,
};
use car_rental_backend::utils::jwt::create_token;
use car_rental_backend::AppState;

const WEBHOOK_SECRET: &str = "whsec_test";
const JWT_SECRET: &str = "test-jwt-secret";

// ── Mock Providers ──

struct MockPayments {
    sessions: Arc<Mutex<Vec<CheckoutSessionRequest>>>,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_checkout_session(
        &self,
        req: CheckoutSessionRequest,
    ) -> anyhow::Result<CheckoutSession> {
        self.sessions.lock().unwrap().push(req);
        Ok(CheckoutSession {
            id: "cs_test_123".to_string(),
            url: "https://checkout.example.com/cs_test_123".to_string(),
        })
    }
}

struct MockEmail {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

struct MockSms {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl SmsProvider for MockSms {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Harness ──

struct TestApp {
    router: Router,
    db: DatabaseConnection,
    customer_id: Uuid,
    customer_token: String,
    admin_token: String,
    car_id: Uuid,
    sessions: Arc<Mutex<Vec<CheckoutSessionRequest>>>,
    emails: Arc<Mutex<Vec<(String, String)>>>,
    sms: Arc<Mutex<Vec<(String, String)>>>,
}

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration_hours: 24,
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        public_origin: Some("https://rentals.example.com".to_string()),
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        resend_api_key: String::new(),
        email_from: "bookings@example.com".to_string(),
        admin_email: "admin@example.com".to_string(),
        admin_phone: "+15550000000".to_string(),
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(), // empty = skip signature validation
        twilio_phone_number: "+15551234567".to_string(),
    }
}

async fn setup() -> TestApp {
    setup_with(test_config()).await
}

async fn setup_with(config: Config) -> TestApp {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1);
    let db = Database::connect(opts).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let admin_id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(admin_id),
        email: Set("admin@example.com".to_string()),
        password_hash: Set("unused".to_string()),
        name: Set("Admin".to_string()),
        role: Set(UserRole::Admin),
        onboarded: Set(true),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let customer_id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(customer_id),
        email: Set("jo@example.com".to_string()),
        password_hash: Set("unused".to_string()),
        name: Set("Jo".to_string()),
        role: Set(UserRole::Customer),
        onboarded: Set(true),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let car_id = Uuid::new_v4();
    car::ActiveModel {
        id: Set(car_id),
        make: Set("Porsche".to_string()),
        model: Set("911".to_string()),
        year: Set(2022),
        daily_rate_cents: Set(45_000),
        hourly_rate_cents: Set(Some(20_000)),
        location: Set("Downtown".to_string()),
        horsepower: Set(Some(379)),
        features: Set(None),
        image_url: Set(None),
        available: Set(true),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let customer_token = create_token(
        customer_id,
        "jo@example.com",
        UserRole::Customer,
        JWT_SECRET,
        24,
    )
    .unwrap();
    let admin_token =
        create_token(admin_id, "admin@example.com", UserRole::Admin, JWT_SECRET, 24).unwrap();

    let sessions = Arc::new(Mutex::new(vec![]));
    let emails = Arc::new(Mutex::new(vec![]));
    let sms = Arc::new(Mutex::new(vec![]));

    let state = AppState {
        db: db.clone(),
        config,
        payments: Arc::new(MockPayments {
            sessions: Arc::clone(&sessions),
        }),
        email: Arc::new(MockEmail {
            sent: Arc::clone(&emails),
        }),
        sms: Arc::new(MockSms {
            sent: Arc::clone(&sms),
        }),
    };

    TestApp {
        router: routes::create_router(state),
        db,
        customer_id,
        customer_token,
        admin_token,
        car_id,
        sessions,
        emails,
        sms,
    }
}

fn peer() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
}

async fn post_json(
    app: &TestApp,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .extension(peer());
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post_webhook(app: &TestApp, payload: &Value, header: Option<String>) -> StatusCode {
    let body = payload.to_string();
    let header =
        header.unwrap_or_else(|| signature::sign(WEBHOOK_SECRET, body.as_bytes(), Utc::now().timestamp()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Content-Type", "application/json")
        .header("Stripe-Signature", header)
        .extension(peer())
        .body(Body::from(body))
        .unwrap();

    app.router.clone().oneshot(request).await.unwrap().status()
}

fn deposit_event(metadata: Value) -> Value {
    json!({
        "id": "evt_test",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_test_123", "metadata": metadata } }
    })
}

async fn create_booking(app: &TestApp) -> booking::Model {
    let (status, body) = post_json(
        app,
        "/api/bookings",
        Some(&app.customer_token),
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-03",
            "pickup_location": "Downtown",
            "total_price_cents": 90_000,
            "deposit_cents": 20_000,
            "booking_type": "rental"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create booking failed: {body}");
    serde_json::from_value(body).unwrap()
}

async fn booking_by_id(app: &TestApp, id: Uuid) -> booking::Model {
    booking::Entity::find_by_id(id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap()
}

async fn booking_count(app: &TestApp) -> u64 {
    booking::Entity::find().count(&app.db).await.unwrap()
}

// ── Duplicate guard ──

#[tokio::test]
async fn duplicate_check_requires_all_fields() {
    let app = setup().await;
    let (status, body) = post_json(
        &app,
        "/api/booking",
        None,
        json!({ "car_id": app.car_id, "user_id": app.customer_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn duplicate_submission_is_rejected_and_creates_no_row() {
    let app = setup().await;
    create_booking(&app).await;
    assert_eq!(booking_count(&app).await, 1);

    // Dedicated check endpoint reports the duplicate
    let (status, body) = post_json(
        &app,
        "/api/booking",
        None,
        json!({
            "car_id": app.car_id,
            "user_id": app.customer_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-03"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], json!(true));

    // Inline guard in the creator rejects the second submission
    let (status, _) = post_json(
        &app,
        "/api/bookings",
        Some(&app.customer_token),
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-03",
            "pickup_location": "Downtown",
            "total_price_cents": 90_000,
            "deposit_cents": 20_000,
            "booking_type": "rental"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(booking_count(&app).await, 1);
}

#[tokio::test]
async fn cancelled_booking_does_not_block_rebooking() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/bookings/{}", booking.id))
        .header("Authorization", format!("Bearer {}", app.customer_token))
        .extension(peer())
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cancelled = booking_by_id(&app, booking.id).await;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // Same car and dates can be booked again
    create_booking(&app).await;
    assert_eq!(booking_count(&app).await, 2);
}

// ── Request creator validation ──

#[tokio::test]
async fn creator_rejects_price_mismatch() {
    let app = setup().await;
    let (status, body) = post_json(
        &app,
        "/api/bookings",
        Some(&app.customer_token),
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-03",
            "pickup_location": "Downtown",
            "total_price_cents": 1, // 2 days x 45000 expected
            "deposit_cents": 1,
            "booking_type": "rental"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Price mismatch"));
    assert_eq!(booking_count(&app).await, 0);
}

#[tokio::test]
async fn creator_rejects_inverted_dates_and_zero_hours() {
    let app = setup().await;
    let (status, _) = post_json(
        &app,
        "/api/bookings",
        Some(&app.customer_token),
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-03",
            "end_date": "2025-09-01",
            "pickup_location": "Downtown",
            "total_price_cents": 90_000,
            "deposit_cents": 20_000,
            "booking_type": "rental"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/api/bookings",
        Some(&app.customer_token),
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-01",
            "pickup_location": "Studio",
            "total_price_cents": 60_000,
            "deposit_cents": 10_000,
            "booking_type": "photoshoot",
            "hours": 0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(booking_count(&app).await, 0);
}

#[tokio::test]
async fn booking_requires_authentication() {
    let app = setup().await;
    let (status, _) = post_json(
        &app,
        "/api/bookings",
        None,
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-03",
            "pickup_location": "Downtown",
            "total_price_cents": 90_000,
            "deposit_cents": 20_000,
            "booking_type": "rental"
        }),
    )
    .await;
    // TypedHeader rejection for the missing Authorization header
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Checkout sessions ──

#[tokio::test]
async fn deposit_checkout_creates_pending_row_then_session() {
    let app = setup().await;
    let (status, body) = post_json(
        &app,
        "/api/checkout/deposit",
        Some(&app.customer_token),
        json!({
            "carId": app.car_id,
            "startDate": "2025-09-01",
            "endDate": "2025-09-03",
            "location": "Downtown",
            "totalPrice": 90_000,
            "bookingType": "rental",
            "depositAmount": 20_000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "deposit checkout failed: {body}");
    assert_eq!(body["url"], json!("https://checkout.example.com/cs_test_123"));

    assert_eq!(booking_count(&app).await, 1);
    let sessions = app.sessions.lock().unwrap();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.amount_cents, 20_000);
    assert_eq!(session.metadata["type"], "deposit");
    assert_eq!(session.metadata["total_price_cents"], "90000");
    assert!(session.metadata.contains_key("booking_key"));
    // Redirects built from the configured public origin
    assert!(session.success_url.starts_with("https://rentals.example.com/"));
}

#[tokio::test]
async fn deposit_checkout_requires_fields() {
    let app = setup().await;
    let (status, _) = post_json(
        &app,
        "/api/checkout/deposit",
        Some(&app.customer_token),
        json!({ "carId": app.car_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn final_checkout_requires_approved_booking() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let (status, _) = post_json(
        &app,
        "/api/checkout",
        Some(&app.customer_token),
        json!({ "bookingId": booking.id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Approve it, then the final session opens for the balance
    let mut active: booking::ActiveModel = booking_by_id(&app, booking.id).await.into();
    active.status = Set(BookingStatus::Approved);
    active.paid_deposit = Set(true);
    active.update(&app.db).await.unwrap();

    let (status, body) = post_json(
        &app,
        "/api/checkout",
        Some(&app.customer_token),
        json!({ "bookingId": booking.id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "final checkout failed: {body}");

    let sessions = app.sessions.lock().unwrap();
    assert_eq!(sessions.last().unwrap().amount_cents, 70_000);
    assert_eq!(sessions.last().unwrap().metadata["type"], "final");
}

#[tokio::test]
async fn final_checkout_requires_paid_deposit() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    // Approved straight from pending, deposit never collected
    let mut active: booking::ActiveModel = booking_by_id(&app, booking.id).await.into();
    active.status = Set(BookingStatus::Approved);
    active.update(&app.db).await.unwrap();

    let (status, body) = post_json(
        &app,
        "/api/checkout",
        Some(&app.customer_token),
        json!({ "bookingId": booking.id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("deposit"));
    assert!(app.sessions.lock().unwrap().is_empty());
}

// ── Webhook reconciler ──

#[tokio::test]
async fn invalid_signature_mutates_nothing() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": booking.booking_key
    }));
    let status = post_webhook(&app, &event, Some("t=1,v1=deadbeef".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let after = booking_by_id(&app, booking.id).await;
    assert!(!after.paid_deposit);
    assert_eq!(after.status, BookingStatus::Pending);
}

#[tokio::test]
async fn deposit_webhook_is_idempotent_for_existing_booking() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": booking.booking_key
    }));

    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    let after = booking_by_id(&app, booking.id).await;
    assert!(after.paid_deposit);
    assert_eq!(after.status, BookingStatus::PendingApproval);

    // Customer confirmation + admin notice, plus the admin SMS prompt
    assert_eq!(app.emails.lock().unwrap().len(), 2);
    assert_eq!(app.sms.lock().unwrap().len(), 1);

    // Redelivery: no extra rows, no extra notifications
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    assert_eq!(booking_count(&app).await, 1);
    assert_eq!(app.emails.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn deposit_webhook_reconstructs_missing_booking_exactly_once() {
    let app = setup().await;

    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": "ZZTESTAB",
        "user_id": app.customer_id,
        "car_id": app.car_id,
        "start_date": "2025-10-01",
        "end_date": "2025-10-04",
        "location": "Airport",
        "total_price_cents": "135000",
        "deposit_cents": "30000",
        "booking_type": "rental"
    }));

    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    assert_eq!(booking_count(&app).await, 1);

    let created = booking::Entity::find()
        .filter(booking::Column::BookingKey.eq("ZZTESTAB"))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(created.paid_deposit);
    assert_eq!(created.status, BookingStatus::PendingApproval);
    assert_eq!(created.total_price_cents, 135_000);

    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    assert_eq!(booking_count(&app).await, 1);
}

#[tokio::test]
async fn deposit_webhook_rejects_incomplete_metadata() {
    let app = setup().await;

    // Unknown key and not enough metadata to reconstruct
    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": "NOPE0000"
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::BAD_REQUEST);
    assert_eq!(booking_count(&app).await, 0);

    // Missing booking_key entirely
    let event = deposit_event(json!({ "type": "deposit" }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::BAD_REQUEST);

    // Unrecognized payment type
    let event = deposit_event(json!({ "type": "subscription" }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let app = setup().await;
    let event = json!({
        "id": "evt_test",
        "type": "invoice.paid",
        "data": { "object": { "id": "in_123", "metadata": {} } }
    });
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
}

#[tokio::test]
async fn final_webhook_confirms_and_never_creates() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let mut active: booking::ActiveModel = booking_by_id(&app, booking.id).await.into();
    active.status = Set(BookingStatus::Approved);
    active.paid_deposit = Set(true);
    active.update(&app.db).await.unwrap();

    let event = deposit_event(json!({
        "type": "final",
        "booking_id": booking.id
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Confirmed);
    assert_eq!(booking_count(&app).await, 1);

    // Redelivery is a no-op
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);

    // Unknown booking id never creates a row
    let event = deposit_event(json!({
        "type": "final",
        "booking_id": Uuid::new_v4()
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::NOT_FOUND);
    assert_eq!(booking_count(&app).await, 1);
}

#[tokio::test]
async fn late_deposit_webhook_does_not_demote_approved_booking() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    // Admin approves while the deposit session is still open
    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": booking.id, "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": booking.booking_key
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);

    // Payment lands, approval stands
    let after = booking_by_id(&app, booking.id).await;
    assert!(after.paid_deposit);
    assert_eq!(after.status, BookingStatus::Approved);

    // The admin gets no review prompt for a booking already approved: one
    // approval email plus the customer's deposit receipt, no SMS
    assert_eq!(app.emails.lock().unwrap().len(), 2);
    assert!(app.sms.lock().unwrap().is_empty());
}

#[tokio::test]
async fn payment_against_cancelled_booking_is_ignored() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let mut active: booking::ActiveModel = booking_by_id(&app, booking.id).await.into();
    active.status = Set(BookingStatus::Cancelled);
    active.update(&app.db).await.unwrap();

    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": booking.booking_key
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);

    let after = booking_by_id(&app, booking.id).await;
    assert_eq!(after.status, BookingStatus::Cancelled);
    assert!(!after.paid_deposit);
}

// ── Admin approval ──

#[tokio::test]
async fn admin_approval_transitions_and_notifies_once() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let (status, body) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": booking.id, "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Approved);

    // Exactly one customer-facing notification attempt
    let emails = app.emails.lock().unwrap().clone();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].0, "jo@example.com");
    assert!(emails[0].1.contains("approved"));
}

#[tokio::test]
async fn admin_rejection_transitions_without_notification() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": booking.id, "status": "rejected" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Rejected);
    assert!(app.emails.lock().unwrap().is_empty());
}

#[tokio::test]
async fn admin_approval_rejects_bad_input_and_roles() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": booking.id, "status": "maybe" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.customer_token),
        json!({ "bookingId": booking.id, "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": Uuid::new_v4(), "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn confirmed_booking_cannot_be_approved_again() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let mut active: booking::ActiveModel = booking_by_id(&app, booking.id).await.into();
    active.status = Set(BookingStatus::Confirmed);
    active.update(&app.db).await.unwrap();

    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": booking.id, "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ── SMS command intake ──

async fn post_sms(app: &TestApp, text: &str) -> (StatusCode, String) {
    let encoded = text.replace(' ', "+");
    let request = Request::builder()
        .method("POST")
        .uri("/api/twilio/inbound")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .extension(peer())
        .body(Body::from(format!(
            "From=%2B15550000000&To=%2B15551234567&Body={encoded}&MessageSid=SM1"
        )))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn sms_yes_approves_matching_suffix() {
    let app = setup().await;
    let booking = create_booking(&app).await;
    let suffix = booking.booking_key[booking.booking_key.len() - 4..].to_lowercase();

    let (status, body) = post_sms(&app, &format!("yes {suffix}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("approved"));
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Approved);

    // Replaying the command is a no-op, not an error
    let (status, body) = post_sms(&app, &format!("YES {suffix}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already"));
}

#[tokio::test]
async fn sms_no_match_mutates_nothing() {
    let app = setup().await;
    let booking = create_booking(&app).await;

    let (status, body) = post_sms(&app, "NOXY99").await;
    assert_eq!(status, StatusCode::OK);
    if body.contains("No booking found") {
        assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Pending);
    } else {
        // Astronomically unlikely: the random key actually ends in XY99
        assert!(booking.booking_key.ends_with("XY99"));
    }
}

#[tokio::test]
async fn sms_gibberish_gets_explicit_reply() {
    let app = setup().await;
    let (status, body) = post_sms(&app, "hello there").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("didn't understand"));
    assert!(body.starts_with("<Response>"));
}

fn twilio_sign(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    use base64::Engine;
    use hmac::{Hmac, Mac};

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut data = url.to_string();
    for (key, value) in sorted {
        data.push_str(key);
        data.push_str(value);
    }
    let mut mac = Hmac::<sha1::Sha1>::new_from_slice(auth_token.as_bytes()).unwrap();
    mac.update(data.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn sms_signature_accepts_full_twilio_parameter_set() {
    const TOKEN: &str = "twilio-test-token";

    let mut config = test_config();
    config.twilio_auth_token = TOKEN.to_string();
    let app = setup_with(config).await;
    let booking = create_booking(&app).await;
    let suffix = booking.booking_key[booking.booking_key.len() - 4..].to_string();

    // Everything a real inbound webhook posts, not just the fields we read
    let params: Vec<(String, String)> = vec![
        ("AccountSid".to_string(), "AC123".to_string()),
        ("Body".to_string(), format!("YES {suffix}")),
        ("From".to_string(), "+15550000000".to_string()),
        ("MessageSid".to_string(), "SM1".to_string()),
        ("NumMedia".to_string(), "0".to_string()),
        ("SmsSid".to_string(), "SM1".to_string()),
        ("To".to_string(), "+15551234567".to_string()),
    ];
    let body = serde_urlencoded::to_string(&params).unwrap();
    // No forwarded or host headers in the test request, so the handler
    // reconstructs https://localhost + path
    let url = "https://localhost/api/twilio/inbound";
    let signature = twilio_sign(TOKEN, url, &params);

    let request = Request::builder()
        .method("POST")
        .uri("/api/twilio/inbound")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("X-Twilio-Signature", &signature)
        .extension(peer())
        .body(Body::from(body.clone()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Approved);

    // A bad signature is refused and mutates nothing further
    let request = Request::builder()
        .method("POST")
        .uri("/api/twilio/inbound")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("X-Twilio-Signature", "bogus")
        .extension(peer())
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ── Auth ──

#[tokio::test]
async fn register_login_roundtrip() {
    let app = setup().await;

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        None,
        json!({ "email": "new@example.com", "password": "hunter22", "name": "New" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["role"], json!("customer"));

    let (status, body) = post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": "new@example.com", "password": "hunter22" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, _) = post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": "new@example.com", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Full lifecycle (spec scenario) ──

#[tokio::test]
async fn full_booking_lifecycle() {
    let app = setup().await;

    // Submit booking: row created, status pending
    let booking = create_booking(&app).await;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert!(!booking.paid_deposit);

    // Deposit webhook: paid_deposit set, awaiting approval
    let event = deposit_event(json!({
        "type": "deposit",
        "booking_key": booking.booking_key
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    let after = booking_by_id(&app, booking.id).await;
    assert!(after.paid_deposit);
    assert_eq!(after.status, BookingStatus::PendingApproval);

    // Duplicate still rejected mid-flow
    let (status, _) = post_json(
        &app,
        "/api/bookings",
        Some(&app.customer_token),
        json!({
            "car_id": app.car_id,
            "start_date": "2025-09-01",
            "end_date": "2025-09-03",
            "pickup_location": "Downtown",
            "total_price_cents": 90_000,
            "deposit_cents": 20_000,
            "booking_type": "rental"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Admin approves
    let (status, _) = post_json(
        &app,
        "/api/admin/approve-booking",
        Some(&app.admin_token),
        json!({ "bookingId": booking.id, "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Approved);

    // Final webhook confirms
    let event = deposit_event(json!({
        "type": "final",
        "booking_id": booking.id
    }));
    assert_eq!(post_webhook(&app, &event, None).await, StatusCode::OK);
    assert_eq!(booking_by_id(&app, booking.id).await.status, BookingStatus::Confirmed);

    assert_eq!(booking_count(&app).await, 1);
}
