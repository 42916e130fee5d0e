use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::refresh_tokens;

/// Stored refresh token row. `token` is the opaque value itself; there is
/// deliberately no hashing here, possession is the credential.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: i32,
    pub user_id: i32,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

impl From<refresh_tokens::Model> for RefreshToken {
    fn from(model: refresh_tokens::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            token: model.token,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }
}

pub struct RefreshTokenRepository {
    conn: DatabaseConnection,
}

impl RefreshTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Persist a freshly minted token. Several live rows per user are
    /// expected (one per device/session).
    pub async fn create(&self, user_id: i32, token: &str, expires_at: &str) -> Result<()> {
        let active = refresh_tokens::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.to_string()),
            expires_at: Set(expires_at.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        refresh_tokens::Entity::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to store refresh token")?;

        Ok(())
    }

    pub async fn find(&self, token: &str) -> Result<Option<RefreshToken>> {
        let row = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query refresh token")?;

        Ok(row.map(RefreshToken::from))
    }

    /// Idempotent delete; returns whether a row was actually removed
    pub async fn delete(&self, token: &str) -> Result<bool> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to delete refresh token")?;

        Ok(result.rows_affected > 0)
    }

    /// Bulk-delete rows whose expiry is in the past
    pub async fn sweep_expired(&self) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to sweep expired refresh tokens")?;

        Ok(result.rows_affected)
    }

    /// Live token count for a user (test support)
    pub async fn count_for_user(&self, user_id: i32) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let count = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count refresh tokens")?;

        Ok(count)
    }
}
