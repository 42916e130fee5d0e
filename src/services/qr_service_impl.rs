//! `SeaORM` implementation of the `QrService` trait.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::QrConfig;
use crate::db::Store;
use crate::services::qr_service::{
    GeneratedQrToken, QrDeviceAccess, QrError, QrService, QrTokenInfo,
};
use crate::services::tokens;

pub struct SeaOrmQrService {
    store: Store,
    qr: QrConfig,
    public_url: String,
}

impl SeaOrmQrService {
    #[must_use]
    pub const fn new(store: Store, qr: QrConfig, public_url: String) -> Self {
        Self {
            store,
            qr,
            public_url,
        }
    }
}

fn is_past(expires_at: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(expires_at)
        .map_or(true, |t| t < chrono::Utc::now())
}

#[async_trait]
impl QrService for SeaOrmQrService {
    async fn generate(
        &self,
        device_id: i32,
        requested_by: i32,
        ttl_hours: Option<i64>,
    ) -> Result<GeneratedQrToken, QrError> {
        let device = self
            .store
            .get_device(device_id)
            .await?
            .ok_or(QrError::DeviceNotFound)?;

        // Sweep this device's expired tokens before adding another
        let swept = self
            .store
            .sweep_expired_qr_tokens_for_device(device_id)
            .await?;
        if swept > 0 {
            debug!("Swept {} expired QR tokens for device {}", swept, device_id);
        }

        let expires_in_hours = ttl_hours.unwrap_or(self.qr.default_ttl_hours);
        let expires_at =
            (chrono::Utc::now() + chrono::Duration::hours(expires_in_hours)).to_rfc3339();

        let token = tokens::generate_qr_token();
        self.store
            .create_qr_token(&token, device_id, requested_by, &expires_at)
            .await?;

        let qr_url = format!("{}/pm-history?token={}", self.public_url, token);

        info!(
            "QR token issued for device {} ({}h TTL)",
            device_id, expires_in_hours
        );

        Ok(GeneratedQrToken {
            token,
            qr_url,
            device_id,
            device_name: device.device_name,
            expires_at,
            expires_in_hours,
        })
    }

    async fn validate(&self, token: &str) -> Result<QrDeviceAccess, QrError> {
        let record = self
            .store
            .find_qr_token(token)
            .await?
            .ok_or(QrError::InvalidToken)?;

        // Device rows cascade-delete their tokens, so a missing device
        // here is indistinguishable from a missing token.
        let device = self
            .store
            .get_device(record.device_id)
            .await?
            .ok_or(QrError::InvalidToken)?;

        if is_past(&record.expires_at) {
            // Left in place for audit; only explicit cleanup removes it
            return Err(QrError::TokenExpired);
        }

        let updated = self
            .store
            .record_qr_access(record.id)
            .await?
            .ok_or(QrError::InvalidToken)?;

        Ok(QrDeviceAccess {
            device_id: device.id,
            device_name: device.device_name,
            serial_number: device.serial_number,
            manufacturer: device.manufacturer,
            location: device.location,
            expires_at: updated.expires_at,
            access_count: updated.access_count,
        })
    }

    async fn revoke(&self, token: &str, user_id: i32, is_admin: bool) -> Result<(), QrError> {
        let record = self
            .store
            .find_qr_token(token)
            .await?
            .ok_or(QrError::TokenNotFound)?;

        if record.generated_by != user_id && !is_admin {
            return Err(QrError::Forbidden);
        }

        self.store.delete_qr_token(token).await?;

        info!("QR token for device {} revoked", record.device_id);

        Ok(())
    }

    async fn list_for_device(&self, device_id: i32) -> Result<Vec<QrTokenInfo>, QrError> {
        let rows = self.store.list_qr_tokens_for_device(device_id).await?;

        Ok(rows
            .into_iter()
            .map(|(token, username)| QrTokenInfo {
                id: token.id,
                token: token.token,
                device_id: token.device_id,
                generated_by: token.generated_by,
                generated_by_username: username,
                expires_at: token.expires_at,
                access_count: token.access_count,
                last_accessed_at: token.last_accessed_at,
                created_at: token.created_at,
            })
            .collect())
    }

    async fn cleanup_expired(&self) -> Result<u64, QrError> {
        let deleted = self.store.cleanup_expired_qr_tokens().await?;
        if deleted > 0 {
            info!("Cleaned up {} expired QR tokens", deleted);
        }
        Ok(deleted)
    }
}
