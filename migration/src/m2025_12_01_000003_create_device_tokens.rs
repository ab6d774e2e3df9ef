use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db_backend = manager.get_database_backend();

        if db_backend == sea_orm::DatabaseBackend::Sqlite {
            manager
                .create_table(
                    Table::create()
                        .table(DeviceToken::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeviceToken::Id)
                                .text()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(DeviceToken::UserId).text().not_null())
                        .col(ColumnDef::new(DeviceToken::Token).string().not_null())
                        .col(ColumnDef::new(DeviceToken::DeviceInfo).json_binary().null())
                        .col(
                            ColumnDef::new(DeviceToken::CreatedAt)
                                .timestamp()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(DeviceToken::UpdatedAt)
                                .timestamp()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;
        } else {
            manager
                .create_table(
                    Table::create()
                        .table(DeviceToken::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeviceToken::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(DeviceToken::UserId).uuid().not_null())
                        .col(ColumnDef::new(DeviceToken::Token).string().not_null())
                        .col(ColumnDef::new(DeviceToken::DeviceInfo).json_binary().null())
                        .col(
                            ColumnDef::new(DeviceToken::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(DeviceToken::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;
        }

        // Re-registering the same device token must update in place
        manager
            .create_index(
                Index::create()
                    .name("idx_device_tokens_user_token")
                    .table(DeviceToken::Table)
                    .col(DeviceToken::UserId)
                    .col(DeviceToken::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceToken::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DeviceToken {
    #[sea_orm(iden = "device_tokens")]
    Table,
    Id,
    UserId,
    Token,
    DeviceInfo,
    CreatedAt,
    UpdatedAt,
}
