use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a booking.
///
/// `pending` -> `pending_approval` (deposit paid) -> `approved` -> `confirmed`
/// (final balance paid). `rejected` and `cancelled` are terminal alternates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    /// A booking still awaiting the admin decision.
    pub fn is_awaiting_review(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::PendingApproval)
    }

    /// Admin approval is allowed only while the booking awaits review.
    pub fn can_approve(&self) -> bool {
        self.is_awaiting_review()
    }

    /// Rejection is also allowed after approval (before the final payment).
    pub fn can_reject(&self) -> bool {
        self.is_awaiting_review() || *self == BookingStatus::Approved
    }

    /// The customer may cancel any booking that is not already settled or dead.
    pub fn can_cancel(&self) -> bool {
        self.is_awaiting_review() || *self == BookingStatus::Approved
    }

    /// States in which a completed payment session must be ignored.
    pub fn is_dead(&self) -> bool {
        matches!(self, BookingStatus::Rejected | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    #[sea_orm(string_value = "rental")]
    Rental,
    #[sea_orm(string_value = "photoshoot")]
    Photoshoot,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Short uppercase key used for SMS suffix matching and webhook idempotency.
    #[sea_orm(unique)]
    pub booking_key: String,
    pub car_id: Uuid,
    pub user_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub pickup_location: String,
    pub total_price_cents: i64,
    pub deposit_cents: i64,
    pub booking_type: BookingType,
    pub hours: Option<i32>,
    pub paid_deposit: bool,
    pub status: BookingStatus,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::car::Entity",
        from = "Column::CarId",
        to = "super::car::Column::Id"
    )]
    Car,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Car.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
