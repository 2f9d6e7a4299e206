use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Car::Table)
                    .if_not_exists()
                    .col(uuid(Car::Id).primary_key())
                    .col(string_len(Car::Make, 100).not_null())
                    .col(string_len(Car::Model, 100).not_null())
                    .col(integer(Car::Year).not_null())
                    .col(big_integer(Car::DailyRateCents).not_null())
                    .col(big_integer_null(Car::HourlyRateCents))
                    .col(string_len(Car::Location, 255).not_null())
                    .col(integer_null(Car::Horsepower))
                    .col(json_null(Car::Features))
                    .col(string_len_null(Car::ImageUrl, 512))
                    .col(boolean(Car::Available).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Car::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Car::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Car {
    Table,
    Id,
    Make,
    Model,
    Year,
    DailyRateCents,
    HourlyRateCents,
    Location,
    Horsepower,
    Features,
    ImageUrl,
    Available,
    CreatedAt,
}
