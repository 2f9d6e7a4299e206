use axum::{
    extract::{Path, Query, State},
    Json,
};
use sea_orm::EntityTrait;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::car;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct CarFilter {
    pub make: Option<String>,
    pub location: Option<String>,
    pub max_daily_rate_cents: Option<i64>,
}

/// List available cars, with optional filters. The fleet is small, so
/// filtering happens in memory over the full set.
pub async fn list_cars(
    State(state): State<AppState>,
    Query(filter): Query<CarFilter>,
) -> AppResult<Json<Vec<car::Model>>> {
    let cars = car::Entity::find().all(&state.db).await?;

    let responses: Vec<car::Model> = cars
        .into_iter()
        .filter(|c| c.available)
        .filter(|c| {
            filter
                .make
                .as_ref()
                .is_none_or(|m| c.make.eq_ignore_ascii_case(m))
        })
        .filter(|c| {
            filter
                .location
                .as_ref()
                .is_none_or(|l| c.location.eq_ignore_ascii_case(l))
        })
        .filter(|c| {
            filter
                .max_daily_rate_cents
                .is_none_or(|max| c.daily_rate_cents <= max)
        })
        .collect();

    Ok(Json(responses))
}

/// Get a single car's details
pub async fn get_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<car::Model>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    Ok(Json(car))
}
