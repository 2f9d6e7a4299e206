use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;
use super::m20250301_000002_create_cars::Car;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(string_len(Booking::BookingKey, 16).not_null().unique_key())
                    .col(uuid(Booking::CarId).not_null())
                    .col(uuid(Booking::UserId).not_null())
                    .col(date(Booking::StartDate).not_null())
                    .col(date(Booking::EndDate).not_null())
                    .col(string_len_null(Booking::StartTime, 16))
                    .col(string_len_null(Booking::EndTime, 16))
                    .col(string_len(Booking::PickupLocation, 255).not_null())
                    .col(big_integer(Booking::TotalPriceCents).not_null())
                    .col(big_integer(Booking::DepositCents).not_null())
                    .col(string_len(Booking::BookingType, 32).not_null())
                    .col(integer_null(Booking::Hours))
                    .col(boolean(Booking::PaidDeposit).not_null().default(false))
                    .col(string_len(Booking::Status, 32).not_null())
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_car")
                            .from(Booking::Table, Booking::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Duplicate submissions are caught by a pre-insert query, not a unique
        // constraint; this index only keeps that lookup fast.
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_car_user_dates")
                    .table(Booking::Table)
                    .col(Booking::CarId)
                    .col(Booking::UserId)
                    .col(Booking::StartDate)
                    .col(Booking::EndDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    BookingKey,
    CarId,
    UserId,
    StartDate,
    EndDate,
    StartTime,
    EndTime,
    PickupLocation,
    TotalPriceCents,
    DepositCents,
    BookingType,
    Hours,
    PaidDeposit,
    Status,
    CreatedAt,
}
