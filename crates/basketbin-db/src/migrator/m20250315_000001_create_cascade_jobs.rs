//! Journal table for resumable basket deletion

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CascadeJobs::Table)
                    .if_not_exists()
                    .col(string(CascadeJobs::BasketName).primary_key())
                    .col(string_len(CascadeJobs::Phase, 32))
                    .col(timestamp_with_time_zone_null(CascadeJobs::BasketCreatedAt))
                    .col(boolean(CascadeJobs::RequestsCleared).default(false))
                    .col(text(CascadeJobs::PendingBlobIds).default(""))
                    .col(text_null(CascadeJobs::LastError))
                    .col(
                        timestamp_with_time_zone(CascadeJobs::StartedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(CascadeJobs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CascadeJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CascadeJobs {
    Table,
    BasketName,
    Phase,
    BasketCreatedAt,
    RequestsCleared,
    PendingBlobIds,
    LastError,
    StartedAt,
    UpdatedAt,
}
