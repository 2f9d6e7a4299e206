use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, BookingType};
use crate::entities::user::{self, UserRole};
use crate::entities::car;
use crate::error::{AppError, AppResult};
use crate::services::notifications::templates::BookingEmail;
use crate::services::notifications::notify_booking;
use crate::AppState;

// ============ Approval Flow ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Decision::Approve),
            "rejected" => Some(Decision::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecisionOutcome {
    Applied,
    /// The booking was already in the decided state; repeat decisions are
    /// no-ops, not errors (SMS commands can be replayed).
    AlreadyDecided,
}

/// Apply an approve/reject decision to a booking. Shared by the admin HTTP
/// endpoint and the SMS command intake. Approval sends the customer one
/// "booking approved" email; rejection sends nothing.
pub async fn apply_decision(
    state: &AppState,
    booking: booking::Model,
    decision: Decision,
) -> AppResult<DecisionOutcome> {
    match decision {
        Decision::Approve => {
            if booking.status == BookingStatus::Approved {
                return Ok(DecisionOutcome::AlreadyDecided);
            }
            if !booking.status.can_approve() {
                return Err(AppError::Conflict(format!(
                    "Booking cannot be approved (status: {:?})",
                    booking.status
                )));
            }
            let mut active: booking::ActiveModel = booking.into();
            active.status = Set(BookingStatus::Approved);
            let updated = active.update(&state.db).await?;

            notify_booking(state, &[BookingEmail::Approved], &updated).await;
            Ok(DecisionOutcome::Applied)
        }
        Decision::Reject => {
            if booking.status == BookingStatus::Rejected {
                return Ok(DecisionOutcome::AlreadyDecided);
            }
            if !booking.status.can_reject() {
                return Err(AppError::Conflict(format!(
                    "Booking cannot be rejected (status: {:?})",
                    booking.status
                )));
            }
            let mut active: booking::ActiveModel = booking.into();
            active.status = Set(BookingStatus::Rejected);
            active.update(&state.db).await?;
            Ok(DecisionOutcome::Applied)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBookingRequest {
    pub booking_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ApproveBookingResponse {
    pub success: bool,
    pub message: String,
}

/// Approve or reject a pending booking (admin)
pub async fn approve_booking(
    State(state): State<AppState>,
    Json(payload): Json<ApproveBookingRequest>,
) -> AppResult<Json<ApproveBookingResponse>> {
    let decision = Decision::parse(&payload.status).ok_or_else(|| {
        AppError::BadRequest("status must be \"approved\" or \"rejected\"".to_string())
    })?;

    let booking = booking::Entity::find_by_id(payload.booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let key = booking.booking_key.clone();
    let outcome = apply_decision(&state, booking, decision).await?;

    let message = match (decision, outcome) {
        (Decision::Approve, DecisionOutcome::Applied) => format!("Booking {} approved", key),
        (Decision::Reject, DecisionOutcome::Applied) => format!("Booking {} rejected", key),
        (_, DecisionOutcome::AlreadyDecided) => {
            format!("Booking {} was already processed", key)
        }
    };

    Ok(Json(ApproveBookingResponse {
        success: true,
        message,
    }))
}

// ============ Booking / User Back-office ============

#[derive(Debug, Serialize)]
pub struct AdminBookingResponse {
    pub id: Uuid,
    pub booking_key: String,
    pub customer: String,
    pub customer_email: String,
    pub car: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price_cents: i64,
    pub deposit_cents: i64,
    pub booking_type: BookingType,
    pub paid_deposit: bool,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// List all bookings with customer and car details (admin)
pub async fn list_bookings(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AdminBookingResponse>>> {
    let bookings = booking::Entity::find()
        .order_by_desc(booking::Column::CreatedAt)
        .all(&state.db)
        .await?;
    let cars = car::Entity::find().all(&state.db).await?;
    let users = user::Entity::find().all(&state.db).await?;

    let responses: Vec<AdminBookingResponse> = bookings
        .into_iter()
        .map(|b| {
            let car_name = cars
                .iter()
                .find(|c| c.id == b.car_id)
                .map(|c| c.display_name())
                .unwrap_or_default();
            let customer = users.iter().find(|u| u.id == b.user_id);

            AdminBookingResponse {
                id: b.id,
                booking_key: b.booking_key,
                customer: customer.map(|u| u.name.clone()).unwrap_or_default(),
                customer_email: customer.map(|u| u.email.clone()).unwrap_or_default(),
                car: car_name,
                start_date: b.start_date,
                end_date: b.end_date,
                total_price_cents: b.total_price_cents,
                deposit_cents: b.deposit_cents,
                booking_type: b.booking_type,
                paid_deposit: b.paid_deposit,
                status: b.status,
                created_at: b.created_at.with_timezone(&Utc),
            }
        })
        .collect();

    Ok(Json(responses))
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub onboarded: bool,
    pub created_at: DateTime<Utc>,
}

/// List all users (admin)
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = user::Entity::find().all(&state.db).await?;

    let responses: Vec<UserResponse> = users
        .into_iter()
        .map(|u| UserResponse {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            phone: u.phone,
            onboarded: u.onboarded,
            created_at: u.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(Json(responses))
}

// ============ Fleet Management ============

#[derive(Debug, Deserialize)]
pub struct CreateCarRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub daily_rate_cents: i64,
    pub hourly_rate_cents: Option<i64>,
    pub location: String,
    pub horsepower: Option<i32>,
    pub features: Option<Vec<String>>,
    pub image_url: Option<String>,
}

/// Add a car to the fleet (admin)
pub async fn create_car(
    State(state): State<AppState>,
    Json(payload): Json<CreateCarRequest>,
) -> AppResult<Json<car::Model>> {
    if payload.daily_rate_cents <= 0 {
        return Err(AppError::BadRequest(
            "Daily rate must be positive".to_string(),
        ));
    }

    let new_car = car::ActiveModel {
        id: Set(Uuid::new_v4()),
        make: Set(payload.make),
        model: Set(payload.model),
        year: Set(payload.year),
        daily_rate_cents: Set(payload.daily_rate_cents),
        hourly_rate_cents: Set(payload.hourly_rate_cents),
        location: Set(payload.location),
        horsepower: Set(payload.horsepower),
        features: Set(payload.features.map(|f| serde_json::json!(f))),
        image_url: Set(payload.image_url),
        available: Set(true),
        ..Default::default()
    };

    let result = new_car.insert(&state.db).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCarRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub daily_rate_cents: Option<i64>,
    pub hourly_rate_cents: Option<i64>,
    pub location: Option<String>,
    pub horsepower: Option<i32>,
    pub features: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub available: Option<bool>,
}

/// Update a car (admin)
pub async fn update_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCarRequest>,
) -> AppResult<Json<car::Model>> {
    let existing = car::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let mut active: car::ActiveModel = existing.into();

    if let Some(make) = payload.make {
        active.make = Set(make);
    }
    if let Some(model) = payload.model {
        active.model = Set(model);
    }
    if let Some(year) = payload.year {
        active.year = Set(year);
    }
    if let Some(rate) = payload.daily_rate_cents {
        if rate <= 0 {
            return Err(AppError::BadRequest(
                "Daily rate must be positive".to_string(),
            ));
        }
        active.daily_rate_cents = Set(rate);
    }
    if let Some(rate) = payload.hourly_rate_cents {
        active.hourly_rate_cents = Set(Some(rate));
    }
    if let Some(location) = payload.location {
        active.location = Set(location);
    }
    if let Some(hp) = payload.horsepower {
        active.horsepower = Set(Some(hp));
    }
    if let Some(features) = payload.features {
        active.features = Set(Some(serde_json::json!(features)));
    }
    if let Some(url) = payload.image_url {
        active.image_url = Set(Some(url));
    }
    if let Some(available) = payload.available {
        active.available = Set(available);
    }

    let result = active.update(&state.db).await?;
    Ok(Json(result))
}

/// Remove a car from the fleet (admin)
pub async fn delete_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = car::Entity::delete_by_id(id).exec(&state.db).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Car not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Car deleted" })))
}
