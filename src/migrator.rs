use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_reference_tables::Migration),
            Box::new(m20240101_000002_create_purchase_request_tables::Migration),
            Box::new(m20240101_000003_create_purchase_order_tables::Migration),
            Box::new(m20240101_000004_create_receipt_tables::Migration),
            Box::new(m20240101_000005_create_workflow_support_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_reference_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Actors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Actors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Actors::DisplayName).string().not_null())
                        .col(
                            ColumnDef::new(Actors::Role)
                                .string_len(32)
                                .not_null()
                                .default("user"),
                        )
                        .col(
                            ColumnDef::new(Actors::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Actors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Actors::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Projects::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Projects::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Projects::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Projects::Name).string().not_null())
                        .col(
                            ColumnDef::new(Projects::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Projects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vendors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vendors::Name).string().not_null())
                        .col(
                            ColumnDef::new(Vendors::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Vendors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Projects::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Actors::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Actors {
        Table,
        Id,
        DisplayName,
        Role,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(crate) enum Projects {
        Table,
        Id,
        Code,
        Name,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(crate) enum Vendors {
        Table,
        Id,
        Name,
        IsActive,
        CreatedAt,
    }
}

mod m20240101_000002_create_purchase_request_tables {
    use super::m20240101_000001_create_reference_tables::Projects;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_purchase_request_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::ProjectId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseRequests::PrNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Status)
                                .string_len(32)
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(PurchaseRequests::RequestedBy).uuid().not_null())
                        .col(ColumnDef::new(PurchaseRequests::ApprovedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::NeededBy).date().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::Priority)
                                .string_len(16)
                                .not_null()
                                .default("normal"),
                        )
                        .col(ColumnDef::new(PurchaseRequests::Notes).text().null())
                        // No FK: purchase_orders.source_pr_id already points back here.
                        .col(ColumnDef::new(PurchaseRequests::ConvertedPoId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::ConvertedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::ConvertedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::UpdatedBy).uuid().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_requests_project_id")
                                .from(PurchaseRequests::Table, PurchaseRequests::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_requests_project_status")
                        .table(PurchaseRequests::Table)
                        .col(PurchaseRequests::ProjectId)
                        .col(PurchaseRequests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequestLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequestLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::ProjectId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::Description)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PurchaseRequestLines::Uom).string_len(32).null())
                        .col(
                            ColumnDef::new(PurchaseRequestLines::EstUnitCost)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseRequestLines::CatalogItemId).uuid().null())
                        .col(ColumnDef::new(PurchaseRequestLines::SovLineId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequestLines::TimelineTaskId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::CreatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestLines::UpdatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_request_lines_request_id")
                                .from(
                                    PurchaseRequestLines::Table,
                                    PurchaseRequestLines::PurchaseRequestId,
                                )
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_request_lines_request_id")
                        .table(PurchaseRequestLines::Table)
                        .col(PurchaseRequestLines::PurchaseRequestId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseRequestLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum PurchaseRequests {
        Table,
        Id,
        ProjectId,
        PrNumber,
        Status,
        RequestedBy,
        ApprovedBy,
        ApprovedAt,
        NeededBy,
        Priority,
        Notes,
        ConvertedPoId,
        ConvertedAt,
        ConvertedBy,
        CreatedAt,
        CreatedBy,
        UpdatedAt,
        UpdatedBy,
    }

    #[derive(DeriveIden)]
    pub(crate) enum PurchaseRequestLines {
        Table,
        Id,
        PurchaseRequestId,
        ProjectId,
        Description,
        Quantity,
        Uom,
        EstUnitCost,
        CatalogItemId,
        SovLineId,
        TimelineTaskId,
        SortOrder,
        IsActive,
        CreatedAt,
        CreatedBy,
        UpdatedAt,
        UpdatedBy,
    }
}

mod m20240101_000003_create_purchase_order_tables {
    use super::m20240101_000001_create_reference_tables::{Projects, Vendors};
    use super::m20240101_000002_create_purchase_request_tables::PurchaseRequests;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::ProjectId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::VendorId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::PoNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Status)
                                .string_len(32)
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SourcePrId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrders::ShipToName).string().null())
                        .col(ColumnDef::new(PurchaseOrders::ShipToAddress1).string().null())
                        .col(ColumnDef::new(PurchaseOrders::ShipToAddress2).string().null())
                        .col(ColumnDef::new(PurchaseOrders::ShipToCity).string().null())
                        .col(ColumnDef::new(PurchaseOrders::ShipToState).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::ShipToPostalCode)
                                .string_len(32)
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::NeededBy).date().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::FreightEstimate)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::TaxEstimate)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Notes).text().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::IssuedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::AcknowledgedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::UpdatedBy).uuid().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_project_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_vendor_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::VendorId)
                                .to(Vendors::Table, Vendors::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_source_pr_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::SourcePrId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // At most one purchase order per purchase request
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_source_pr_id")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::SourcePrId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_vendor_id")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::VendorId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Description)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::Uom).string_len(32).null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::UnitCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::LineStatus)
                                .string_len(16)
                                .not_null()
                                .default("open"),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::SourcePrLineId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrderLines::CatalogItemId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrderLines::SovLineId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrderLines::TimelineTaskId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::UpdatedBy).uuid().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_order_id")
                                .from(
                                    PurchaseOrderLines::Table,
                                    PurchaseOrderLines::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_order_lines_order_id")
                        .table(PurchaseOrderLines::Table)
                        .col(PurchaseOrderLines::PurchaseOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum PurchaseOrders {
        Table,
        Id,
        ProjectId,
        VendorId,
        PoNumber,
        Status,
        SourcePrId,
        ShipToName,
        #[sea_orm(iden = "ship_to_address1")]
        ShipToAddress1,
        #[sea_orm(iden = "ship_to_address2")]
        ShipToAddress2,
        ShipToCity,
        ShipToState,
        ShipToPostalCode,
        NeededBy,
        FreightEstimate,
        TaxEstimate,
        Notes,
        IssuedAt,
        AcknowledgedAt,
        CreatedAt,
        CreatedBy,
        UpdatedAt,
        UpdatedBy,
    }

    #[derive(DeriveIden)]
    pub(crate) enum PurchaseOrderLines {
        Table,
        Id,
        PurchaseOrderId,
        Description,
        Quantity,
        Uom,
        UnitCost,
        LineStatus,
        SourcePrLineId,
        CatalogItemId,
        SovLineId,
        TimelineTaskId,
        SortOrder,
        IsActive,
        CreatedAt,
        CreatedBy,
        UpdatedAt,
        UpdatedBy,
    }
}

mod m20240101_000004_create_receipt_tables {
    use super::m20240101_000001_create_reference_tables::{Projects, Vendors};
    use super::m20240101_000003_create_purchase_order_tables::{
        PurchaseOrderLines, PurchaseOrders,
    };
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_receipt_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Receipts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Receipts::ProjectId).uuid().not_null())
                        .col(ColumnDef::new(Receipts::VendorId).uuid().null())
                        .col(ColumnDef::new(Receipts::PurchaseOrderId).uuid().null())
                        .col(
                            ColumnDef::new(Receipts::ReceiptNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Receipts::Status)
                                .string_len(32)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(Receipts::ReceivedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Receipts::ReceivedBy).uuid().null())
                        .col(ColumnDef::new(Receipts::Location).string().null())
                        .col(ColumnDef::new(Receipts::Notes).text().null())
                        .col(
                            ColumnDef::new(Receipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Receipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::UpdatedBy).uuid().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_project_id")
                                .from(Receipts::Table, Receipts::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_vendor_id")
                                .from(Receipts::Table, Receipts::VendorId)
                                .to(Vendors::Table, Vendors::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_purchase_order_id")
                                .from(Receipts::Table, Receipts::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_purchase_order_id")
                        .table(Receipts::Table)
                        .col(Receipts::PurchaseOrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceiptLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceiptLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceiptLines::ReceiptId).uuid().not_null())
                        .col(ColumnDef::new(ReceiptLines::PurchaseOrderLineId).uuid().null())
                        .col(ColumnDef::new(ReceiptLines::Description).text().not_null())
                        .col(
                            ColumnDef::new(ReceiptLines::QtyReceived)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ReceiptLines::Uom).string_len(32).null())
                        .col(
                            ColumnDef::new(ReceiptLines::Condition)
                                .string_len(16)
                                .not_null()
                                .default("good"),
                        )
                        .col(ColumnDef::new(ReceiptLines::Notes).text().null())
                        .col(
                            ColumnDef::new(ReceiptLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceiptLines::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(ReceiptLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceiptLines::UpdatedBy).uuid().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipt_lines_receipt_id")
                                .from(ReceiptLines::Table, ReceiptLines::ReceiptId)
                                .to(Receipts::Table, Receipts::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipt_lines_po_line_id")
                                .from(ReceiptLines::Table, ReceiptLines::PurchaseOrderLineId)
                                .to(PurchaseOrderLines::Table, PurchaseOrderLines::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipt_lines_po_line_id")
                        .table(ReceiptLines::Table)
                        .col(ReceiptLines::PurchaseOrderLineId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceiptLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Receipts {
        Table,
        Id,
        ProjectId,
        VendorId,
        PurchaseOrderId,
        ReceiptNumber,
        Status,
        ReceivedAt,
        ReceivedBy,
        Location,
        Notes,
        CreatedAt,
        CreatedBy,
        UpdatedAt,
        UpdatedBy,
    }

    #[derive(DeriveIden)]
    enum ReceiptLines {
        Table,
        Id,
        ReceiptId,
        PurchaseOrderLineId,
        Description,
        QtyReceived,
        Uom,
        Condition,
        Notes,
        CreatedAt,
        CreatedBy,
        UpdatedAt,
        UpdatedBy,
    }
}

mod m20240101_000005_create_workflow_support_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_workflow_support_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StatusLog::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StatusLog::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(StatusLog::EntityType).string_len(32).not_null())
                        .col(ColumnDef::new(StatusLog::EntityId).uuid().not_null())
                        .col(ColumnDef::new(StatusLog::ProjectId).uuid().null())
                        .col(ColumnDef::new(StatusLog::FromStatus).string_len(32).null())
                        .col(ColumnDef::new(StatusLog::ToStatus).string_len(32).null())
                        .col(ColumnDef::new(StatusLog::Message).text().not_null())
                        .col(ColumnDef::new(StatusLog::Metadata).json().not_null())
                        .col(ColumnDef::new(StatusLog::ActorId).uuid().not_null())
                        .col(
                            ColumnDef::new(StatusLog::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_status_log_entity")
                        .table(StatusLog::Table)
                        .col(StatusLog::EntityType)
                        .col(StatusLog::EntityId)
                        .col(StatusLog::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_status_log_project_id")
                        .table(StatusLog::Table)
                        .col(StatusLog::ProjectId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::Category)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::PeriodYear)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .primary_key(
                            Index::create()
                                .col(DocumentSequences::Category)
                                .col(DocumentSequences::PeriodYear),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchasingSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchasingSettings::Id)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchasingSettings::ApprovalThreshold)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(1000),
                        )
                        .col(
                            ColumnDef::new(PurchasingSettings::PrNumbering)
                                .string_len(16)
                                .not_null()
                                .default("yearly"),
                        )
                        .col(
                            ColumnDef::new(PurchasingSettings::PoNumbering)
                                .string_len(16)
                                .not_null()
                                .default("global"),
                        )
                        .col(
                            ColumnDef::new(PurchasingSettings::ReceiptNumbering)
                                .string_len(16)
                                .not_null()
                                .default("global"),
                        )
                        .col(
                            ColumnDef::new(PurchasingSettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchasingSettings::UpdatedBy).uuid().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchasingSettings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StatusLog::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StatusLog {
        #[sea_orm(iden = "status_log")]
        Table,
        Id,
        EntityType,
        EntityId,
        ProjectId,
        FromStatus,
        ToStatus,
        Message,
        Metadata,
        ActorId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        Category,
        PeriodYear,
        LastValue,
    }

    #[derive(DeriveIden)]
    enum PurchasingSettings {
        Table,
        Id,
        ApprovalThreshold,
        PrNumbering,
        PoNumbering,
        ReceiptNumbering,
        UpdatedAt,
        UpdatedBy,
    }
}
