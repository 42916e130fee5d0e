use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(QrTokens)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Validation looks tokens up by value; sweeps scan by device and expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_qr_tokens_device_id")
                    .table(QrTokens)
                    .col(crate::entities::qr_tokens::Column::DeviceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_qr_tokens_expires_at")
                    .table(QrTokens)
                    .col(crate::entities::qr_tokens::Column::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QrTokens).to_owned())
            .await?;

        Ok(())
    }
}
