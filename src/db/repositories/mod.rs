pub mod checklist;
pub mod device;
pub mod pm_log;
pub mod qr_token;
pub mod refresh_token;
pub mod user;
