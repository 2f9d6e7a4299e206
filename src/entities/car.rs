use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "car")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub daily_rate_cents: i64,
    /// Hourly rate for photoshoot bookings; cars without one cannot be booked
    /// for photoshoots.
    pub hourly_rate_cents: Option<i64>,
    pub location: String,
    pub horsepower: Option<i32>,
    /// Feature tags as a JSON array of strings.
    pub features: Option<Json>,
    pub image_url: Option<String>,
    pub available: bool,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
