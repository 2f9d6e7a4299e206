use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, BookingType};
use crate::error::{AppError, AppResult};
use crate::services::notifications::templates::BookingEmail;
use crate::services::notifications::notify_booking;
use crate::services::payments::{signature, PaymentKind};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripeSessionObject,
}

#[derive(Debug, Deserialize)]
struct StripeSessionObject {
    id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Payment-processor callback. Authenticated by signature verification, not
/// session auth; the signature check happens on the raw body before any
/// parsing, and a failure mutates nothing.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    let sig_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    if !signature::verify(
        &state.config.stripe_webhook_secret,
        sig_header,
        &body,
        Utc::now().timestamp(),
    ) {
        tracing::warn!("webhook signature verification failed");
        return Err(AppError::BadRequest(
            "Invalid webhook signature".to_string(),
        ));
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "ignoring unhandled event");
        return Ok(Json(serde_json::json!({ "received": true })));
    }

    let session = event.data.object;
    tracing::info!(
        session_id = session.id.as_deref().unwrap_or("-"),
        "checkout session completed"
    );

    let kind = session
        .metadata
        .get("type")
        .and_then(|t| PaymentKind::parse(t))
        .ok_or_else(|| {
            AppError::BadRequest("Unrecognized or missing payment type in metadata".to_string())
        })?;

    match kind {
        PaymentKind::Deposit => reconcile_deposit(&state, &session.metadata).await?,
        PaymentKind::Final => reconcile_final(&state, &session.metadata).await?,
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

/// Apply a completed deposit session. Idempotent: the booking key is the
/// dedup handle, and redelivery of the same event changes nothing.
async fn reconcile_deposit(
    state: &AppState,
    metadata: &HashMap<String, String>,
) -> AppResult<()> {
    let booking_key = metadata
        .get("booking_key")
        .ok_or_else(|| AppError::BadRequest("Deposit event missing booking_key".to_string()))?;

    let existing = booking::Entity::find()
        .filter(booking::Column::BookingKey.eq(booking_key))
        .one(&state.db)
        .await?;

    let booking = match existing {
        Some(b) if b.paid_deposit => {
            tracing::info!(booking_key, "deposit already recorded, ignoring redelivery");
            return Ok(());
        }
        Some(b) if b.status.is_dead() => {
            // The customer cancelled (or admin rejected) while the payment
            // session was still open. Record nothing; the processor's own
            // refund tooling handles the money side.
            tracing::warn!(
                booking_key,
                status = ?b.status,
                "deposit completed for a dead booking, ignoring"
            );
            return Ok(());
        }
        Some(b) => {
            // The admin can approve before the deposit session completes; a
            // late deposit must never move the booking backwards, only a
            // `pending` one advances to review.
            let advance = b.status == BookingStatus::Pending;
            let mut active: booking::ActiveModel = b.into();
            active.paid_deposit = Set(true);
            if advance {
                active.status = Set(BookingStatus::PendingApproval);
            }
            active.update(&state.db).await?
        }
        // The webhook can arrive before any row exists; the metadata carries
        // enough to reconstruct the booking.
        None => insert_from_metadata(state, booking_key, metadata).await?,
    };

    // The admin is only prompted to review when the booking actually sits in
    // the review queue; an already-approved booking just gets the customer
    // receipt.
    let kinds: &[BookingEmail] = if booking.status == BookingStatus::PendingApproval {
        &[BookingEmail::DepositConfirmed, BookingEmail::AdminDepositNotice]
    } else {
        &[BookingEmail::DepositConfirmed]
    };
    notify_booking(state, kinds, &booking).await;

    Ok(())
}

fn require<'a>(
    metadata: &'a HashMap<String, String>,
    key: &str,
) -> AppResult<&'a String> {
    metadata
        .get(key)
        .ok_or_else(|| AppError::BadRequest(format!("Deposit event metadata missing {}", key)))
}

async fn insert_from_metadata(
    state: &AppState,
    booking_key: &str,
    metadata: &HashMap<String, String>,
) -> AppResult<booking::Model> {
    let parse_err =
        |key: &str| AppError::BadRequest(format!("Deposit event metadata invalid {}", key));

    let user_id: Uuid = require(metadata, "user_id")?
        .parse()
        .map_err(|_| parse_err("user_id"))?;
    let car_id: Uuid = require(metadata, "car_id")?
        .parse()
        .map_err(|_| parse_err("car_id"))?;
    let start_date = require(metadata, "start_date")?
        .parse()
        .map_err(|_| parse_err("start_date"))?;
    let end_date = require(metadata, "end_date")?
        .parse()
        .map_err(|_| parse_err("end_date"))?;
    let location = require(metadata, "location")?.clone();
    let total_price_cents: i64 = require(metadata, "total_price_cents")?
        .parse()
        .map_err(|_| parse_err("total_price_cents"))?;
    let deposit_cents: i64 = require(metadata, "deposit_cents")?
        .parse()
        .map_err(|_| parse_err("deposit_cents"))?;
    let booking_type = match require(metadata, "booking_type")?.as_str() {
        "rental" => BookingType::Rental,
        "photoshoot" => BookingType::Photoshoot,
        _ => return Err(parse_err("booking_type")),
    };
    let hours = metadata
        .get("hours")
        .map(|h| h.parse::<i32>().map_err(|_| parse_err("hours")))
        .transpose()?;

    let booking_id = metadata
        .get("booking_id")
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(Uuid::new_v4);

    let new_booking = booking::ActiveModel {
        id: Set(booking_id),
        booking_key: Set(booking_key.to_string()),
        car_id: Set(car_id),
        user_id: Set(user_id),
        start_date: Set(start_date),
        end_date: Set(end_date),
        start_time: Set(metadata.get("start_time").cloned()),
        end_time: Set(metadata.get("end_time").cloned()),
        pickup_location: Set(location),
        total_price_cents: Set(total_price_cents),
        deposit_cents: Set(deposit_cents),
        booking_type: Set(booking_type),
        hours: Set(hours),
        paid_deposit: Set(true),
        status: Set(BookingStatus::PendingApproval),
        ..Default::default()
    };

    Ok(new_booking.insert(&state.db).await?)
}

/// Apply a completed final-balance session: `approved` becomes `confirmed`.
/// Never creates a row.
async fn reconcile_final(state: &AppState, metadata: &HashMap<String, String>) -> AppResult<()> {
    let booking_id: Uuid = metadata
        .get("booking_id")
        .ok_or_else(|| AppError::BadRequest("Final event missing booking_id".to_string()))?
        .parse()
        .map_err(|_| AppError::BadRequest("Final event has invalid booking_id".to_string()))?;

    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found for final payment".to_string()))?;

    if booking.status == BookingStatus::Confirmed {
        tracing::info!(booking_id = %booking_id, "final payment already recorded, ignoring redelivery");
        return Ok(());
    }
    if booking.status.is_dead() {
        tracing::warn!(
            booking_id = %booking_id,
            status = ?booking.status,
            "final payment completed for a dead booking, ignoring"
        );
        return Ok(());
    }

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Confirmed);
    let booking = active.update(&state.db).await?;

    notify_booking(
        state,
        &[BookingEmail::FinalConfirmed, BookingEmail::AdminFinalNotice],
        &booking,
    )
    .await;

    Ok(())
}
