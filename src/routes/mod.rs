use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{admin, auth, bookings, cars, checkout, contact, sms, webhooks};
use crate::middleware::auth::{auth_middleware, require_admin, require_customer};
use crate::middleware::rate_limit::create_public_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // IP-based governor for unauthenticated routes
    let public_governor = create_public_governor();

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    // Public fleet browsing, duplicate check and contact form
    let public_routes = Router::new()
        .route("/cars", get(cars::list_cars))
        .route("/cars/{id}", get(cars::get_car))
        .route("/booking", post(bookings::check_booking))
        .route("/contact", post(contact::contact))
        .layer(public_governor);

    // Provider callbacks: authenticated by signature, never rate limited so
    // processor retries are not throttled. "/webhook" is the legacy path.
    let callback_routes = Router::new()
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/webhook", post(webhooks::stripe_webhook))
        .route("/twilio/inbound", post(sms::twilio_inbound));

    // Customer routes (requires auth + customer role)
    let customer_routes = Router::new()
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings", get(bookings::my_bookings))
        .route("/bookings/{id}", delete(bookings::cancel_booking))
        .route("/checkout/deposit", post(checkout::deposit_checkout))
        .route("/checkout/final", post(checkout::final_checkout))
        .route("/checkout", post(checkout::final_checkout))
        .route("/profile", get(auth::get_profile))
        .route("/profile", put(auth::update_profile))
        .layer(middleware::from_fn(require_customer))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/approve-booking", post(admin::approve_booking))
        .route("/bookings", get(admin::list_bookings))
        .route("/users", get(admin::list_users))
        .route("/cars", post(admin::create_car))
        .route("/cars/{id}", put(admin::update_car))
        .route("/cars/{id}", delete(admin::delete_car))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(public_routes)
        .merge(callback_routes)
        .merge(customer_routes);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", api)
        .with_state(state)
}
