use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240901_000001_create_tours_table::Migration),
            Box::new(m20240901_000002_create_bookings_table::Migration),
            Box::new(m20240901_000003_create_payments_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240901_000001_create_tours_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000001_create_tours_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Tours::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tours::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Tours::AgencyId).uuid().not_null())
                        .col(ColumnDef::new(Tours::Name).string().not_null())
                        .col(
                            ColumnDef::new(Tours::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Tours::AdultPrice).decimal().not_null())
                        .col(ColumnDef::new(Tours::ChildrenPrice).decimal().not_null())
                        .col(ColumnDef::new(Tours::Discount).decimal().null())
                        .col(ColumnDef::new(Tours::PickupPoints).json().null())
                        .col(ColumnDef::new(Tours::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Tours::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tours_agency_id")
                        .table(Tours::Table)
                        .col(Tours::AgencyId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tours::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Tours {
        Table,
        Id,
        AgencyId,
        Name,
        IsActive,
        AdultPrice,
        ChildrenPrice,
        Discount,
        PickupPoints,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240901_000002_create_bookings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000002_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Bookings::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::TourId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::TravelDate).date().not_null())
                        .col(ColumnDef::new(Bookings::Adults).integer().not_null())
                        .col(
                            ColumnDef::new(Bookings::Children)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Bookings::PickupPoint).string().not_null())
                        .col(ColumnDef::new(Bookings::Note).string().null())
                        .col(ColumnDef::new(Bookings::TotalPrice).decimal().not_null())
                        .col(ColumnDef::new(Bookings::Status).string().not_null())
                        .col(ColumnDef::new(Bookings::BookingDate).timestamp().not_null())
                        .col(ColumnDef::new(Bookings::ApprovedAt).timestamp().null())
                        .col(ColumnDef::new(Bookings::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Bookings::RejectedAt).timestamp().null())
                        .col(ColumnDef::new(Bookings::RejectedReason).string().null())
                        .col(ColumnDef::new(Bookings::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_customer_id")
                        .table(Bookings::Table)
                        .col(Bookings::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_tour_id")
                        .table(Bookings::Table)
                        .col(Bookings::TourId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_status")
                        .table(Bookings::Table)
                        .col(Bookings::Status)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Bookings {
        Table,
        Id,
        CustomerId,
        TourId,
        TravelDate,
        Adults,
        Children,
        PickupPoint,
        Note,
        TotalPrice,
        Status,
        BookingDate,
        ApprovedAt,
        PaidAt,
        RejectedAt,
        RejectedReason,
        UpdatedAt,
    }
}

mod m20240901_000003_create_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000003_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::BookingId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::Provider).string().not_null())
                        .col(ColumnDef::new(Payments::ProviderOrderId).string().null())
                        .col(ColumnDef::new(Payments::RequestId).string().null())
                        .col(ColumnDef::new(Payments::ProviderTxn).string().null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::PayUrl).string().null())
                        .col(ColumnDef::new(Payments::ExtraData).json().null())
                        .col(ColumnDef::new(Payments::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Payments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // At most one payment per booking, enforced by the database.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_payments_booking_id")
                        .table(Payments::Table)
                        .col(Payments::BookingId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // IPN correlation key must stay unique once assigned.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_payments_provider_order_id")
                        .table(Payments::Table)
                        .col(Payments::ProviderOrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Payments {
        Table,
        Id,
        BookingId,
        Amount,
        Provider,
        ProviderOrderId,
        RequestId,
        ProviderTxn,
        Status,
        PayUrl,
        ExtraData,
        PaidAt,
        CreatedAt,
        UpdatedAt,
    }
}
