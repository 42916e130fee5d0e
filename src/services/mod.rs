pub mod auth_service;
pub mod auth_service_impl;
pub mod password_policy;
pub mod qr_service;
pub mod qr_service_impl;
pub mod tokens;

pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;
pub use qr_service::{QrError, QrService};
pub use qr_service_impl::SeaOrmQrService;
