//! Domain service for QR capability tokens.
//!
//! A QR token grants read access to one device's maintenance history and
//! nothing else: no identity, no role, no other device.

use thiserror::Error;

/// Errors specific to QR token operations.
#[derive(Debug, Error)]
pub enum QrError {
    #[error("Device not found")]
    DeviceNotFound,

    #[error("Invalid QR token")]
    InvalidToken,

    #[error("QR token has expired")]
    TokenExpired,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for QrError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for QrError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A freshly issued capability token plus the URL to encode as a QR code
#[derive(Debug, Clone)]
pub struct GeneratedQrToken {
    pub token: String,
    pub qr_url: String,
    pub device_id: i32,
    pub device_name: String,
    pub expires_at: String,
    pub expires_in_hours: i64,
}

/// What a valid token grants: the bound device's identity, read-only
#[derive(Debug, Clone)]
pub struct QrDeviceAccess {
    pub device_id: i32,
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub location: String,
    pub expires_at: String,
    /// Post-increment count, so the first validation reports 1
    pub access_count: i32,
}

/// Listing row for a device's tokens. Serializes with snake_case keys,
/// the shape the device-token admin view consumes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QrTokenInfo {
    pub id: i32,
    pub token: String,
    pub device_id: i32,
    pub generated_by: i32,
    pub generated_by_username: Option<String>,
    pub expires_at: String,
    pub access_count: i32,
    pub last_accessed_at: Option<String>,
    pub created_at: String,
}

/// Domain service trait for QR capability tokens.
#[async_trait::async_trait]
pub trait QrService: Send + Sync {
    /// Issues a token for a device. The device's expired tokens are swept
    /// first. TTL defaults from configuration and is deliberately
    /// uncapped: kiosk placards want month-long windows.
    async fn generate(
        &self,
        device_id: i32,
        requested_by: i32,
        ttl_hours: Option<i64>,
    ) -> Result<GeneratedQrToken, QrError>;

    /// Validates a token and records the access. Expired tokens are
    /// reported but never deleted here; they stay visible for audit until
    /// explicit cleanup.
    async fn validate(&self, token: &str) -> Result<QrDeviceAccess, QrError>;

    /// Revokes a token. Only the generator or an admin may do this.
    async fn revoke(&self, token: &str, user_id: i32, is_admin: bool) -> Result<(), QrError>;

    /// All tokens for a device, newest first, expired ones included.
    async fn list_for_device(&self, device_id: i32) -> Result<Vec<QrTokenInfo>, QrError>;

    /// Deletes every expired token; returns how many went.
    async fn cleanup_expired(&self) -> Result<u64, QrError>;
}
