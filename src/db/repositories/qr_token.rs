use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{prelude::*, qr_tokens};

#[derive(Debug, Clone)]
pub struct QrToken {
    pub id: i32,
    pub token: String,
    pub device_id: i32,
    pub generated_by: i32,
    pub expires_at: String,
    pub access_count: i32,
    pub last_accessed_at: Option<String>,
    pub created_at: String,
}

impl From<qr_tokens::Model> for QrToken {
    fn from(model: qr_tokens::Model) -> Self {
        Self {
            id: model.id,
            token: model.token,
            device_id: model.device_id,
            generated_by: model.generated_by,
            expires_at: model.expires_at,
            access_count: model.access_count,
            last_accessed_at: model.last_accessed_at,
            created_at: model.created_at,
        }
    }
}

pub struct QrTokenRepository {
    conn: DatabaseConnection,
}

impl QrTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        token: &str,
        device_id: i32,
        generated_by: i32,
        expires_at: &str,
    ) -> Result<QrToken> {
        let active = qr_tokens::ActiveModel {
            token: Set(token.to_string()),
            device_id: Set(device_id),
            generated_by: Set(generated_by),
            expires_at: Set(expires_at.to_string()),
            access_count: Set(0),
            last_accessed_at: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to store QR token")?;

        Ok(QrToken::from(model))
    }

    pub async fn find(&self, token: &str) -> Result<Option<QrToken>> {
        let row = qr_tokens::Entity::find()
            .filter(qr_tokens::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query QR token")?;

        Ok(row.map(QrToken::from))
    }

    /// Bump the access counter and stamp the access time. Returns the
    /// updated row so callers can report the post-increment count.
    pub async fn record_access(&self, id: i32) -> Result<Option<QrToken>> {
        let row = qr_tokens::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query QR token for access update")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let next_count = row.access_count + 1;
        let mut active: qr_tokens::ActiveModel = row.into();
        active.access_count = Set(next_count);
        active.last_accessed_at = Set(Some(chrono::Utc::now().to_rfc3339()));
        let updated = active.update(&self.conn).await?;

        Ok(Some(QrToken::from(updated)))
    }

    /// Idempotent delete by token value
    pub async fn delete(&self, token: &str) -> Result<bool> {
        let result = qr_tokens::Entity::delete_many()
            .filter(qr_tokens::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to delete QR token")?;

        Ok(result.rows_affected > 0)
    }

    /// All tokens for a device, newest first, with the generator's username
    /// (None when the generator row is gone).
    pub async fn list_for_device(&self, device_id: i32) -> Result<Vec<(QrToken, Option<String>)>> {
        let rows = qr_tokens::Entity::find()
            .filter(qr_tokens::Column::DeviceId.eq(device_id))
            .order_by_desc(qr_tokens::Column::CreatedAt)
            .find_also_related(Users)
            .all(&self.conn)
            .await
            .context("Failed to list QR tokens for device")?;

        Ok(rows
            .into_iter()
            .map(|(token, user)| (QrToken::from(token), user.map(|u| u.username)))
            .collect())
    }

    /// Expired-token sweep scoped to one device, run before issuing a new
    /// token for it.
    pub async fn sweep_expired_for_device(&self, device_id: i32) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = qr_tokens::Entity::delete_many()
            .filter(qr_tokens::Column::DeviceId.eq(device_id))
            .filter(qr_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to sweep expired QR tokens for device")?;

        Ok(result.rows_affected)
    }

    /// Explicit global cleanup; validation never deletes expired rows, so
    /// this is the only way they leave the table.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = qr_tokens::Entity::delete_many()
            .filter(qr_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to clean up expired QR tokens")?;

        Ok(result.rows_affected)
    }
}
