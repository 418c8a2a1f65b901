//! Initial schema: baskets and captured request metadata

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. baskets
        // ============================================================
        // The primary key is the only guard against duplicate names; two
        // concurrent inserts of the same name cannot both commit.
        manager
            .create_table(
                Table::create()
                    .table(Baskets::Table)
                    .if_not_exists()
                    .col(string(Baskets::Name).primary_key())
                    .col(string_null(Baskets::Token).unique_key())
                    .col(
                        timestamp_with_time_zone(Baskets::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. requests
        // ============================================================
        // basket_name is a logical reference only: captures may race with
        // basket deletion, and rows are removed by the application cascade.
        manager
            .create_table(
                Table::create()
                    .table(Requests::Table)
                    .if_not_exists()
                    .col(pk_auto(Requests::Id))
                    .col(string(Requests::BasketName))
                    .col(timestamp_with_time_zone(Requests::SentAt))
                    .col(string(Requests::Method))
                    .col(text(Requests::Headers))
                    .col(string_null(Requests::BodyMongoId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_requests_basket_name")
                    .table(Requests::Table)
                    .col(Requests::BasketName)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Requests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Baskets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Baskets {
    Table,
    Name,
    Token,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Requests {
    Table,
    Id,
    BasketName,
    SentAt,
    Method,
    Headers,
    BodyMongoId,
}
