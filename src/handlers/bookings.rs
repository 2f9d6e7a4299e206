use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, BookingType};
use crate::entities::car;
use crate::error::{AppError, AppResult};
use crate::utils::booking_key;
use crate::utils::jwt::Claims;
use crate::utils::price;
use crate::AppState;

/// Find an existing non-cancelled booking for the same car, user and date
/// range. This is the duplicate guard; it is a read-only pre-insert check, so
/// two concurrent submissions can still both pass it.
pub async fn find_duplicate(
    db: &DatabaseConnection,
    car_id: Uuid,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Option<booking::Model>, sea_orm::DbErr> {
    booking::Entity::find()
        .filter(booking::Column::CarId.eq(car_id))
        .filter(booking::Column::UserId.eq(user_id))
        .filter(booking::Column::StartDate.eq(start_date))
        .filter(booking::Column::EndDate.eq(end_date))
        .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
        .one(db)
        .await
}

// ============ Duplicate Check Endpoint ============

// Fields are Options so a missing field yields a 400 with a message instead of
// a deserializer rejection.
#[derive(Debug, Deserialize)]
pub struct DuplicateCheckRequest {
    pub car_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateCheckResponse {
    pub exists: bool,
    pub message: String,
}

/// Check whether a booking already exists for (car, user, date range).
pub async fn check_booking(
    State(state): State<AppState>,
    Json(payload): Json<DuplicateCheckRequest>,
) -> AppResult<Json<DuplicateCheckResponse>> {
    let (Some(car_id), Some(user_id), Some(start_date), Some(end_date)) = (
        payload.car_id,
        payload.user_id,
        payload.start_date,
        payload.end_date,
    ) else {
        return Err(AppError::BadRequest(
            "car_id, user_id, start_date and end_date are required".to_string(),
        ));
    };

    let existing = find_duplicate(&state.db, car_id, user_id, start_date, end_date).await?;

    Ok(Json(match existing {
        Some(_) => DuplicateCheckResponse {
            exists: true,
            message: "A booking already exists for this car and date range".to_string(),
        },
        None => DuplicateCheckResponse {
            exists: false,
            message: "No existing booking found".to_string(),
        },
    }))
}

// ============ Booking Request Creator ============

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub car_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub pickup_location: String,
    pub total_price_cents: i64,
    pub deposit_cents: i64,
    pub booking_type: BookingType,
    pub hours: Option<i32>,
}

/// Validate a submission and insert a `pending` booking row.
///
/// The total is recomputed from the car's rates; a client-supplied total that
/// disagrees is rejected rather than trusted.
pub async fn create_pending_booking(
    state: &AppState,
    user_id: Uuid,
    input: NewBooking,
) -> AppResult<booking::Model> {
    let car = car::Entity::find_by_id(input.car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    if !car.available {
        return Err(AppError::BadRequest(
            "This car is not currently available".to_string(),
        ));
    }

    let expected_total = match input.booking_type {
        BookingType::Rental => {
            if input.end_date < input.start_date {
                return Err(AppError::BadRequest(
                    "End date must not be before start date".to_string(),
                ));
            }
            price::rental_total_cents(input.start_date, input.end_date, car.daily_rate_cents)
        }
        BookingType::Photoshoot => {
            let hours = input.hours.unwrap_or(0);
            if hours <= 0 {
                return Err(AppError::BadRequest(
                    "Photoshoot bookings require hours > 0".to_string(),
                ));
            }
            let hourly = car.hourly_rate_cents.ok_or_else(|| {
                AppError::BadRequest("This car is not available for photoshoots".to_string())
            })?;
            price::photoshoot_total_cents(hours, hourly)
        }
    };

    if input.total_price_cents != expected_total {
        return Err(AppError::BadRequest(format!(
            "Price mismatch: expected {} cents for this booking",
            expected_total
        )));
    }

    if input.deposit_cents <= 0 || input.deposit_cents > expected_total {
        return Err(AppError::BadRequest(
            "Deposit must be positive and no more than the total".to_string(),
        ));
    }

    let existing =
        find_duplicate(&state.db, input.car_id, user_id, input.start_date, input.end_date).await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "A booking for this car and date range already exists".to_string(),
        ));
    }

    let new_booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_key: Set(booking_key::generate()),
        car_id: Set(input.car_id),
        user_id: Set(user_id),
        start_date: Set(input.start_date),
        end_date: Set(input.end_date),
        start_time: Set(input.start_time),
        end_time: Set(input.end_time),
        pickup_location: Set(input.pickup_location),
        total_price_cents: Set(expected_total),
        deposit_cents: Set(input.deposit_cents),
        booking_type: Set(input.booking_type),
        hours: Set(input.hours),
        paid_deposit: Set(false),
        status: Set(BookingStatus::Pending),
        ..Default::default()
    };

    Ok(new_booking.insert(&state.db).await?)
}

/// Create a booking request (status `pending`)
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewBooking>,
) -> AppResult<Json<booking::Model>> {
    let booking = create_pending_booking(&state, claims.sub, payload).await?;
    Ok(Json(booking))
}

// ============ Customer Booking Views ============

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub booking_key: String,
    pub car: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pickup_location: String,
    pub total_price_cents: i64,
    pub deposit_cents: i64,
    pub booking_type: BookingType,
    pub paid_deposit: bool,
    pub status: BookingStatus,
}

/// List the authenticated customer's bookings, newest first.
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::UserId.eq(claims.sub))
        .order_by_desc(booking::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let cars = car::Entity::find().all(&state.db).await?;

    let responses: Vec<BookingResponse> = bookings
        .into_iter()
        .map(|b| {
            let car_name = cars
                .iter()
                .find(|c| c.id == b.car_id)
                .map(|c| c.display_name())
                .unwrap_or_default();
            BookingResponse {
                id: b.id,
                booking_key: b.booking_key,
                car: car_name,
                start_date: b.start_date,
                end_date: b.end_date,
                pickup_location: b.pickup_location,
                total_price_cents: b.total_price_cents,
                deposit_cents: b.deposit_cents,
                booking_type: b.booking_type,
                paid_deposit: b.paid_deposit,
                status: b.status,
            }
        })
        .collect();

    Ok(Json(responses))
}

/// Cancel a booking (soft: status becomes `cancelled`, the row is kept as
/// history). A payment session already opened against it is handled
/// defensively by the webhook reconciler.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only cancel your own bookings".to_string(),
        ));
    }

    if !booking.status.can_cancel() {
        return Err(AppError::Conflict(format!(
            "Booking can no longer be cancelled (status: {:?})",
            booking.status
        )));
    }

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Cancelled);
    active.update(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Booking cancelled" })))
}
