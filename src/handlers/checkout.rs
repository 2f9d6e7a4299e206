use std::collections::HashMap;

use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::{extract::State, Extension, Json};
use chrono::NaiveDate;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, BookingType};
use crate::entities::car;
use crate::error::{AppError, AppResult};
use crate::handlers::bookings::{create_pending_booking, NewBooking};
use crate::services::payments::{CheckoutSessionRequest, PaymentKind};
use crate::utils::jwt::Claims;
use crate::AppState;

const LOCAL_ORIGIN: &str = "http://localhost:3000";

/// Base origin for success/cancel redirects: configured public origin first,
/// then the request's Origin header, then the local default. Trailing slashes
/// are trimmed so path concatenation stays clean.
pub fn resolve_origin(state: &AppState, headers: &HeaderMap) -> String {
    state
        .config
        .public_origin
        .clone()
        .or_else(|| {
            headers
                .get(ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| LOCAL_ORIGIN.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Metadata attached to a deposit session. Enough to reconstruct the booking
/// row if the webhook arrives before any row exists; everything is a string
/// because the processor only stores string metadata.
fn deposit_metadata(b: &booking::Model) -> HashMap<String, String> {
    let mut m = HashMap::from([
        ("type".to_string(), PaymentKind::Deposit.as_str().to_string()),
        ("booking_id".to_string(), b.id.to_string()),
        ("booking_key".to_string(), b.booking_key.clone()),
        ("user_id".to_string(), b.user_id.to_string()),
        ("car_id".to_string(), b.car_id.to_string()),
        ("start_date".to_string(), b.start_date.to_string()),
        ("end_date".to_string(), b.end_date.to_string()),
        ("location".to_string(), b.pickup_location.clone()),
        ("total_price_cents".to_string(), b.total_price_cents.to_string()),
        ("deposit_cents".to_string(), b.deposit_cents.to_string()),
        (
            "booking_type".to_string(),
            match b.booking_type {
                BookingType::Rental => "rental".to_string(),
                BookingType::Photoshoot => "photoshoot".to_string(),
            },
        ),
    ]);
    if let Some(t) = &b.start_time {
        m.insert("start_time".to_string(), t.clone());
    }
    if let Some(t) = &b.end_time {
        m.insert("end_time".to_string(), t.clone());
    }
    if let Some(h) = b.hours {
        m.insert("hours".to_string(), h.to_string());
    }
    m
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCheckoutRequest {
    /// Charge the deposit of an existing booking instead of creating one.
    pub booking_id: Option<Uuid>,
    pub car_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub total_price: Option<i64>,
    pub booking_type: Option<BookingType>,
    pub hours: Option<i32>,
    pub deposit_amount: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Open a deposit checkout session. Without a `bookingId` the pending booking
/// row is created first (canonical timing: row first, webhook only updates).
pub async fn deposit_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(payload): Json<DepositCheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let booking = match payload.booking_id {
        Some(id) => {
            let booking = booking::Entity::find_by_id(id)
                .one(&state.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
            if booking.user_id != claims.sub {
                return Err(AppError::Forbidden(
                    "You can only pay for your own bookings".to_string(),
                ));
            }
            if booking.paid_deposit {
                return Err(AppError::Conflict(
                    "Deposit has already been paid".to_string(),
                ));
            }
            if booking.status != BookingStatus::Pending {
                return Err(AppError::Conflict(format!(
                    "Booking is not awaiting a deposit (status: {:?})",
                    booking.status
                )));
            }
            booking
        }
        None => {
            let (Some(car_id), Some(start_date), Some(end_date), Some(location), Some(total), Some(booking_type), Some(deposit)) = (
                payload.car_id,
                payload.start_date,
                payload.end_date,
                payload.location.clone(),
                payload.total_price,
                payload.booking_type.clone(),
                payload.deposit_amount,
            ) else {
                return Err(AppError::BadRequest(
                    "carId, startDate, endDate, location, totalPrice, bookingType and depositAmount are required".to_string(),
                ));
            };

            create_pending_booking(
                &state,
                claims.sub,
                NewBooking {
                    car_id,
                    start_date,
                    end_date,
                    start_time: payload.start_time,
                    end_time: payload.end_time,
                    pickup_location: location,
                    total_price_cents: total,
                    deposit_cents: deposit,
                    booking_type,
                    hours: payload.hours,
                },
            )
            .await?
        }
    };

    let car = car::Entity::find_by_id(booking.car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let origin = resolve_origin(&state, &headers);
    let session = state
        .payments
        .create_checkout_session(CheckoutSessionRequest {
            amount_cents: booking.deposit_cents,
            product_name: format!("Deposit for {}", car.display_name()),
            success_url: format!("{}/bookings?payment=success", origin),
            cancel_url: format!("{}/bookings?payment=cancelled", origin),
            metadata: deposit_metadata(&booking),
        })
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    Ok(Json(CheckoutResponse { url: session.url }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalCheckoutRequest {
    pub booking_id: Option<Uuid>,
}

/// Open a checkout session for the remaining balance of an approved booking.
pub async fn final_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(payload): Json<FinalCheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let booking_id = payload
        .booking_id
        .ok_or_else(|| AppError::BadRequest("bookingId is required".to_string()))?;

    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only pay for your own bookings".to_string(),
        ));
    }
    if booking.status != BookingStatus::Approved {
        return Err(AppError::Conflict(format!(
            "Final payment requires an approved booking (status: {:?})",
            booking.status
        )));
    }
    if !booking.paid_deposit {
        // Approval can precede the deposit; the final session only covers the
        // balance, so opening it now would leave the deposit uncollected.
        return Err(AppError::Conflict(
            "Final payment requires the deposit to be paid first".to_string(),
        ));
    }

    let balance = booking.total_price_cents - booking.deposit_cents;
    if balance <= 0 {
        return Err(AppError::Conflict("No balance due".to_string()));
    }

    let car = car::Entity::find_by_id(booking.car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let metadata = HashMap::from([
        ("type".to_string(), PaymentKind::Final.as_str().to_string()),
        ("booking_id".to_string(), booking.id.to_string()),
        ("booking_key".to_string(), booking.booking_key.clone()),
    ]);

    let origin = resolve_origin(&state, &headers);
    let session = state
        .payments
        .create_checkout_session(CheckoutSessionRequest {
            amount_cents: balance,
            product_name: format!("Final balance for {}", car.display_name()),
            success_url: format!("{}/bookings?payment=success", origin),
            cancel_url: format!("{}/bookings?payment=cancelled", origin),
            metadata,
        })
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    Ok(Json(CheckoutResponse { url: session.url }))
}
