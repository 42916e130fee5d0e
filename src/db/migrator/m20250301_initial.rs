use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Bootstrap credential; `must_change_password` forces rotation at first login
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

fn bootstrap_username() -> String {
    std::env::var("MAINTARR_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_owned())
}

fn bootstrap_password() -> String {
    std::env::var("MAINTARR_ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_owned())
}

/// Hash the bootstrap password using Argon2id
fn hash_bootstrap_password(password: &str) -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash bootstrap password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PasswordHistory)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(RefreshTokens)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Devices)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PmChecklists)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PmTasks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PmLogs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PmLogTasks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Lookup paths that are hot on every request cycle
        manager
            .create_index(
                Index::create()
                    .name("idx_password_history_user_id")
                    .table(PasswordHistory)
                    .col(crate::entities::password_history::Column::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_password_history_created_at")
                    .table(PasswordHistory)
                    .col(crate::entities::password_history::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_refresh_tokens_user_id")
                    .table(RefreshTokens)
                    .col(crate::entities::refresh_tokens::Column::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_refresh_tokens_expires_at")
                    .table(RefreshTokens)
                    .col(crate::entities::refresh_tokens::Column::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pm_checklists_device_id")
                    .table(PmChecklists)
                    .col(crate::entities::pm_checklists::Column::DeviceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pm_tasks_checklist_id")
                    .table(PmTasks)
                    .col(crate::entities::pm_tasks::Column::ChecklistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pm_logs_device_id")
                    .table(PmLogs)
                    .col(crate::entities::pm_logs::Column::DeviceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pm_logs_date")
                    .table(PmLogs)
                    .col(crate::entities::pm_logs::Column::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pm_log_tasks_pm_log_id")
                    .table(PmLogTasks)
                    .col(crate::entities::pm_log_tasks::Column::PmLogId)
                    .to_owned(),
            )
            .await?;

        // Seed the bootstrap administrator
        let now = chrono::Utc::now().to_rfc3339();
        let password_hash = hash_bootstrap_password(&bootstrap_password());

        let insert = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                crate::entities::users::Column::Username,
                crate::entities::users::Column::PasswordHash,
                crate::entities::users::Column::LastName,
                crate::entities::users::Column::FirstName,
                crate::entities::users::Column::MiddleName,
                crate::entities::users::Column::Position,
                crate::entities::users::Column::Role,
                crate::entities::users::Column::MustChangePassword,
                crate::entities::users::Column::CreatedAt,
                crate::entities::users::Column::UpdatedAt,
            ])
            .values_panic([
                bootstrap_username().into(),
                password_hash.into(),
                "Administrator".into(),
                "System".into(),
                "".into(),
                "System Administrator".into(),
                "admin".into(),
                true.into(),
                now.clone().into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PmLogTasks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PmLogs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PmTasks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PmChecklists).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Devices).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RefreshTokens).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PasswordHistory).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
