use super::{Profiles, QueryHistory};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueryHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueryHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueryHistory::UserId).string().not_null())
                    .col(ColumnDef::new(QueryHistory::Question).text().not_null())
                    .col(ColumnDef::new(QueryHistory::Answer).text().not_null())
                    .col(ColumnDef::new(QueryHistory::PageTitle).string().null())
                    .col(ColumnDef::new(QueryHistory::PageUrl).string().null())
                    .col(ColumnDef::new(QueryHistory::PageDomain).string().null())
                    .col(ColumnDef::new(QueryHistory::ContextText).text().null())
                    .col(ColumnDef::new(QueryHistory::SelectedText).text().null())
                    .col(ColumnDef::new(QueryHistory::ModelUsed).string().not_null())
                    .col(
                        ColumnDef::new(QueryHistory::ResponseTimeMs)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QueryHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite cannot add a foreign key after table creation
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Postgres {
            manager
                .create_foreign_key(
                    ForeignKey::create()
                        .name("fk_query_history_user_id")
                        .from(QueryHistory::Table, QueryHistory::UserId)
                        .to(Profiles::Table, Profiles::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_query_history_user_created")
                    .table(QueryHistory::Table)
                    .col(QueryHistory::UserId)
                    .col(QueryHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueryHistory::Table).to_owned())
            .await
    }
}
