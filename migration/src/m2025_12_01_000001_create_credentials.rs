use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db_backend = manager.get_database_backend();

        if db_backend == sea_orm::DatabaseBackend::Sqlite {
            // SQLite stores UUIDs as TEXT
            manager
                .create_table(
                    Table::create()
                        .table(Credential::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Credential::Id)
                                .text()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Credential::UserId).text().not_null())
                        .col(ColumnDef::new(Credential::Service).string().not_null())
                        .col(
                            ColumnDef::new(Credential::AccessTokenCiphertext)
                                .blob()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Credential::RefreshTokenCiphertext)
                                .blob()
                                .null(),
                        )
                        .col(ColumnDef::new(Credential::ExpiresAt).timestamp().null())
                        .col(ColumnDef::new(Credential::Scopes).json_binary().null())
                        .col(ColumnDef::new(Credential::ExternalId).string().null())
                        .col(ColumnDef::new(Credential::WebhookUrl).string().null())
                        .col(ColumnDef::new(Credential::ApiKey).string().null())
                        .col(
                            ColumnDef::new(Credential::CreatedAt)
                                .timestamp()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(Credential::UpdatedAt)
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
                        .table(Credential::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Credential::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Credential::UserId).uuid().not_null())
                        .col(ColumnDef::new(Credential::Service).string().not_null())
                        .col(
                            ColumnDef::new(Credential::AccessTokenCiphertext)
                                .binary()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Credential::RefreshTokenCiphertext)
                                .binary()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Credential::ExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Credential::Scopes).json_binary().null())
                        .col(ColumnDef::new(Credential::ExternalId).string().null())
                        .col(ColumnDef::new(Credential::WebhookUrl).string().null())
                        .col(ColumnDef::new(Credential::ApiKey).string().null())
                        .col(
                            ColumnDef::new(Credential::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(Credential::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;
        }

        // One credential row per (user_id, service); the upsert path conflicts
        // against this index.
        manager
            .create_index(
                Index::create()
                    .name("idx_credentials_user_service")
                    .table(Credential::Table)
                    .col(Credential::UserId)
                    .col(Credential::Service)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Credential::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Credential {
    #[sea_orm(iden = "credentials")]
    Table,
    Id,
    UserId,
    Service,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    ExpiresAt,
    Scopes,
    ExternalId,
    WebhookUrl,
    ApiKey,
    CreatedAt,
    UpdatedAt,
}
