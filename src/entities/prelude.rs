pub use super::devices::Entity as Devices;
pub use super::password_history::Entity as PasswordHistory;
pub use super::pm_checklists::Entity as PmChecklists;
pub use super::pm_log_tasks::Entity as PmLogTasks;
pub use super::pm_logs::Entity as PmLogs;
pub use super::pm_tasks::Entity as PmTasks;
pub use super::qr_tokens::Entity as QrTokens;
pub use super::refresh_tokens::Entity as RefreshTokens;
pub use super::users::Entity as Users;
