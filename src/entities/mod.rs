pub mod prelude;

pub mod devices;
pub mod password_history;
pub mod pm_checklists;
pub mod pm_log_tasks;
pub mod pm_logs;
pub mod pm_tasks;
pub mod qr_tokens;
pub mod refresh_tokens;
pub mod users;
