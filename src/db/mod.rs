use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;

pub mod migrator;
pub mod repositories;

pub use repositories::checklist::{Checklist, ChecklistTask};
pub use repositories::device::{Device, DeviceConflict, DeviceInput};
pub use repositories::pm_log::{
    DeviceLogRollup, NewPmLog, PmLog, PmLogFilters, PmLogTask, PmLogTotals, PmLogUpdate,
    PmLogWithCounts,
};
pub use repositories::qr_token::QrToken;
pub use repositories::refresh_token::RefreshToken;
pub use repositories::user::{
    NewUser, PASSWORD_HISTORY_DEPTH, User, UserStats, UserUpdate, hash_password,
};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn refresh_token_repo(&self) -> repositories::refresh_token::RefreshTokenRepository {
        repositories::refresh_token::RefreshTokenRepository::new(self.conn.clone())
    }

    fn qr_token_repo(&self) -> repositories::qr_token::QrTokenRepository {
        repositories::qr_token::QrTokenRepository::new(self.conn.clone())
    }

    fn device_repo(&self) -> repositories::device::DeviceRepository {
        repositories::device::DeviceRepository::new(self.conn.clone())
    }

    fn checklist_repo(&self) -> repositories::checklist::ChecklistRepository {
        repositories::checklist::ChecklistRepository::new(self.conn.clone())
    }

    fn pm_log_repo(&self) -> repositories::pm_log::PmLogRepository {
        repositories::pm_log::PmLogRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Users & password history
    // ========================================================================

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>> {
        self.user_repo().verify_credentials(username, password).await
    }

    pub async fn verify_password_for_id(&self, user_id: i32, password: &str) -> Result<bool> {
        self.user_repo()
            .verify_password_for_id(user_id, password)
            .await
    }

    pub async fn create_user(&self, new_user: NewUser, config: &SecurityConfig) -> Result<User> {
        self.user_repo().create(new_user, config).await
    }

    pub async fn update_user(&self, user_id: i32, update: UserUpdate) -> Result<Option<User>> {
        self.user_repo().update(user_id, update).await
    }

    pub async fn delete_user(&self, user_id: i32) -> Result<bool> {
        self.user_repo().delete(user_id).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.user_repo().username_exists(username).await
    }

    pub async fn list_users(
        &self,
        page: u64,
        limit: u64,
        search: Option<&str>,
        role: Option<&str>,
    ) -> Result<(Vec<User>, u64)> {
        self.user_repo().list(page, limit, search, role).await
    }

    pub async fn user_stats(&self) -> Result<UserStats> {
        self.user_repo().stats().await
    }

    pub async fn is_password_reused(&self, user_id: i32, candidate: &str) -> Result<bool> {
        self.user_repo().is_password_reused(user_id, candidate).await
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo()
            .change_password(user_id, new_password, config)
            .await
    }

    pub async fn reset_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo()
            .reset_password(user_id, new_password, config)
            .await
    }

    pub async fn password_history_len(&self, user_id: i32) -> Result<u64> {
        self.user_repo().history_len(user_id).await
    }

    // ========================================================================
    // Refresh tokens
    // ========================================================================

    pub async fn store_refresh_token(
        &self,
        user_id: i32,
        token: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.refresh_token_repo()
            .create(user_id, token, expires_at)
            .await
    }

    pub async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.refresh_token_repo().find(token).await
    }

    pub async fn delete_refresh_token(&self, token: &str) -> Result<bool> {
        self.refresh_token_repo().delete(token).await
    }

    pub async fn sweep_expired_refresh_tokens(&self) -> Result<u64> {
        self.refresh_token_repo().sweep_expired().await
    }

    pub async fn count_refresh_tokens_for_user(&self, user_id: i32) -> Result<u64> {
        self.refresh_token_repo().count_for_user(user_id).await
    }

    // ========================================================================
    // QR tokens
    // ========================================================================

    pub async fn create_qr_token(
        &self,
        token: &str,
        device_id: i32,
        generated_by: i32,
        expires_at: &str,
    ) -> Result<QrToken> {
        self.qr_token_repo()
            .create(token, device_id, generated_by, expires_at)
            .await
    }

    pub async fn find_qr_token(&self, token: &str) -> Result<Option<QrToken>> {
        self.qr_token_repo().find(token).await
    }

    pub async fn record_qr_access(&self, id: i32) -> Result<Option<QrToken>> {
        self.qr_token_repo().record_access(id).await
    }

    pub async fn delete_qr_token(&self, token: &str) -> Result<bool> {
        self.qr_token_repo().delete(token).await
    }

    pub async fn list_qr_tokens_for_device(
        &self,
        device_id: i32,
    ) -> Result<Vec<(QrToken, Option<String>)>> {
        self.qr_token_repo().list_for_device(device_id).await
    }

    pub async fn sweep_expired_qr_tokens_for_device(&self, device_id: i32) -> Result<u64> {
        self.qr_token_repo()
            .sweep_expired_for_device(device_id)
            .await
    }

    pub async fn cleanup_expired_qr_tokens(&self) -> Result<u64> {
        self.qr_token_repo().cleanup_expired().await
    }

    // ========================================================================
    // Devices
    // ========================================================================

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.device_repo().list_all().await
    }

    pub async fn get_device(&self, id: i32) -> Result<Option<Device>> {
        self.device_repo().get(id).await
    }

    pub async fn device_exists(&self, id: i32) -> Result<bool> {
        self.device_repo().exists(id).await
    }

    pub async fn find_device_conflict(
        &self,
        serial_number: &str,
        asset_tag: &str,
        exclude_id: Option<i32>,
    ) -> Result<Option<DeviceConflict>> {
        self.device_repo()
            .find_conflict(serial_number, asset_tag, exclude_id)
            .await
    }

    pub async fn create_device(&self, input: DeviceInput) -> Result<Device> {
        self.device_repo().create(input).await
    }

    pub async fn update_device(&self, id: i32, input: DeviceInput) -> Result<Option<Device>> {
        self.device_repo().update(id, input).await
    }

    pub async fn delete_device(&self, id: i32) -> Result<bool> {
        self.device_repo().delete(id).await
    }

    pub async fn search_devices(&self, term: &str) -> Result<Vec<Device>> {
        self.device_repo().search(term).await
    }

    // ========================================================================
    // PM checklists
    // ========================================================================

    pub async fn list_checklists(&self) -> Result<Vec<Checklist>> {
        self.checklist_repo().list_all().await
    }

    pub async fn get_checklist(&self, id: i32) -> Result<Option<Checklist>> {
        self.checklist_repo().get(id).await
    }

    pub async fn get_checklist_with_tasks(
        &self,
        id: i32,
    ) -> Result<Option<(Checklist, Vec<ChecklistTask>)>> {
        self.checklist_repo().get_with_tasks(id).await
    }

    pub async fn create_checklist_with_tasks(
        &self,
        device: &Device,
        maintenance_types: &[String],
        task_frequency: &str,
        task_descriptions: &[String],
    ) -> Result<(Checklist, Vec<ChecklistTask>)> {
        self.checklist_repo()
            .create_with_tasks(device, maintenance_types, task_frequency, task_descriptions)
            .await
    }

    pub async fn update_checklist(
        &self,
        id: i32,
        maintenance_types: Option<&[String]>,
        task_frequency: Option<&str>,
    ) -> Result<Option<Checklist>> {
        self.checklist_repo()
            .update(id, maintenance_types, task_frequency)
            .await
    }

    pub async fn delete_checklist(&self, id: i32) -> Result<bool> {
        self.checklist_repo().delete(id).await
    }

    pub async fn add_checklist_task(
        &self,
        checklist_id: i32,
        description: &str,
    ) -> Result<ChecklistTask> {
        self.checklist_repo().add_task(checklist_id, description).await
    }

    pub async fn get_checklist_task(&self, task_id: i32) -> Result<Option<ChecklistTask>> {
        self.checklist_repo().get_task(task_id).await
    }

    pub async fn set_checklist_task_completion(
        &self,
        task_id: i32,
        is_completed: bool,
        notes: Option<String>,
        completed_by: &str,
    ) -> Result<Option<ChecklistTask>> {
        self.checklist_repo()
            .set_task_completion(task_id, is_completed, notes, completed_by)
            .await
    }

    pub async fn update_checklist_task_description(
        &self,
        task_id: i32,
        description: &str,
    ) -> Result<Option<ChecklistTask>> {
        self.checklist_repo()
            .update_task_description(task_id, description)
            .await
    }

    pub async fn delete_checklist_task(&self, task_id: i32) -> Result<Option<ChecklistTask>> {
        self.checklist_repo().delete_task(task_id).await
    }

    // ========================================================================
    // PM logs
    // ========================================================================

    pub async fn list_pm_logs(&self, filters: &PmLogFilters) -> Result<Vec<PmLog>> {
        self.pm_log_repo().list(filters).await
    }

    pub async fn get_pm_log(&self, id: i32) -> Result<Option<PmLog>> {
        self.pm_log_repo().get(id).await
    }

    pub async fn get_pm_log_with_tasks(
        &self,
        id: i32,
    ) -> Result<Option<(PmLog, Vec<PmLogTask>)>> {
        self.pm_log_repo().get_with_tasks(id).await
    }

    pub async fn create_pm_log_with_tasks(
        &self,
        device: &Device,
        new_log: NewPmLog,
    ) -> Result<(PmLog, Vec<PmLogTask>)> {
        self.pm_log_repo().create_with_tasks(device, new_log).await
    }

    pub async fn device_pm_history(
        &self,
        device_id: i32,
        limit: u64,
    ) -> Result<Vec<PmLogWithCounts>> {
        self.pm_log_repo().device_history(device_id, limit).await
    }

    pub async fn update_pm_log(&self, id: i32, update: PmLogUpdate) -> Result<Option<PmLog>> {
        self.pm_log_repo().update(id, update).await
    }

    pub async fn delete_pm_log(&self, id: i32) -> Result<Option<PmLog>> {
        self.pm_log_repo().delete(id).await
    }

    pub async fn get_pm_log_task(&self, task_id: i32) -> Result<Option<PmLogTask>> {
        self.pm_log_repo().get_task(task_id).await
    }

    pub async fn set_pm_log_task_checked(
        &self,
        task_id: i32,
        is_checked: bool,
    ) -> Result<Option<PmLogTask>> {
        self.pm_log_repo().set_task_checked(task_id, is_checked).await
    }

    pub async fn add_pm_log_task(
        &self,
        pm_log_id: i32,
        description: &str,
        maintenance_type: &str,
    ) -> Result<PmLogTask> {
        self.pm_log_repo()
            .add_task(pm_log_id, description, maintenance_type)
            .await
    }

    pub async fn delete_pm_log_task(&self, task_id: i32) -> Result<Option<PmLogTask>> {
        self.pm_log_repo().delete_task(task_id).await
    }

    pub async fn pm_log_statistics(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<(PmLogTotals, Vec<DeviceLogRollup>)> {
        self.pm_log_repo().statistics(start_date, end_date).await
    }
}
