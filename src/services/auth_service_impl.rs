//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, SecurityConfig};
use crate::db::Store;
use crate::services::auth_service::{
    AuthError, AuthService, ChangePasswordResult, LoginResult, ProfileUpdate, RefreshResult,
};
use crate::services::password_policy;
use crate::services::tokens;

pub struct SeaOrmAuthService {
    store: Store,
    auth: AuthConfig,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, auth: AuthConfig, security: SecurityConfig) -> Self {
        Self {
            store,
            auth,
            security,
        }
    }

    fn issue_token(&self, user_id: i32, username: &str, role: &str) -> Result<String, AuthError> {
        let token = tokens::issue_access_token(
            &self.auth.jwt_secret,
            user_id,
            username,
            role,
            self.auth.access_token_ttl_minutes,
        )?;
        Ok(token)
    }
}

/// Parse a stored expiry stamp. Unreadable stamps count as expired, so a
/// corrupt row can never extend a session.
fn is_past(expires_at: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(expires_at)
        .map_or(true, |t| t < chrono::Utc::now())
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        // Opportunistic sweep: no background scheduler, cleanup rides on
        // the request path.
        let swept = self.store.sweep_expired_refresh_tokens().await?;
        if swept > 0 {
            debug!("Swept {} expired refresh tokens", swept);
        }

        let user = self
            .store
            .verify_credentials(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let token = self.issue_token(user.id, &user.username, &user.role)?;

        let refresh_token = tokens::generate_refresh_token();
        let refresh_ttl_secs = self.auth.refresh_token_ttl_days * 24 * 60 * 60;
        let expires_at = (chrono::Utc::now() + chrono::Duration::seconds(refresh_ttl_secs))
            .to_rfc3339();
        self.store
            .store_refresh_token(user.id, &refresh_token, &expires_at)
            .await?;

        info!("User '{}' logged in", user.username);

        Ok(LoginResult {
            token,
            refresh_token,
            refresh_ttl_secs,
            user,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError> {
        let record = self
            .store
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if is_past(&record.expires_at) {
            // Expired rows are reported precisely once, then deleted
            self.store.delete_refresh_token(refresh_token).await?;
            return Err(AuthError::RefreshTokenExpired);
        }

        // Sweep the rest while we are here
        let swept = self.store.sweep_expired_refresh_tokens().await?;
        if swept > 0 {
            debug!("Swept {} expired refresh tokens", swept);
        }

        let user = self
            .store
            .get_user_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // The refresh token is deliberately not rotated: possession of the
        // cookie keeps working until expiry or logout.
        let token = self.issue_token(user.id, &user.username, &user.role)?;

        Ok(RefreshResult { token })
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let deleted = self.store.delete_refresh_token(refresh_token).await?;
        if !deleted {
            debug!("Logout presented an unknown refresh token");
        }
        Ok(())
    }

    async fn authenticate_bearer(&self, token: &str) -> Result<crate::db::User, AuthError> {
        let claims = tokens::verify_access_token(&self.auth.jwt_secret, token)?;

        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        // Re-fetch so a deleted account is locked out immediately, not at
        // token expiry.
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(user)
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordResult, AuthError> {
        let strength = password_policy::validate_strength(new_password);
        if !strength.is_valid() {
            return Err(AuthError::WeakPassword(
                strength.failed_requirements().join(", "),
            ));
        }

        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let current_ok = self
            .store
            .verify_password_for_id(user_id, current_password)
            .await?;
        if !current_ok {
            warn!("Wrong current password on change attempt for '{}'", user.username);
            return Err(AuthError::InvalidCurrentPassword);
        }

        if self.store.is_password_reused(user_id, new_password).await? {
            return Err(AuthError::PasswordReused);
        }

        let updated = self
            .store
            .change_password(user_id, new_password, &self.security)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Fresh token so the client doesn't keep a pre-change session
        let token = self.issue_token(updated.id, &updated.username, &updated.role)?;

        info!("User '{}' changed their password", updated.username);

        Ok(ChangePasswordResult {
            token,
            user: updated,
        })
    }

    async fn profile(&self, user_id: i32) -> Result<crate::db::User, AuthError> {
        self.store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn update_profile(
        &self,
        user_id: i32,
        update: ProfileUpdate,
    ) -> Result<crate::db::User, AuthError> {
        if update.is_empty() {
            return Err(AuthError::NoUpdates);
        }

        let user_update = crate::db::UserUpdate {
            last_name: update.last_name,
            first_name: update.first_name,
            middle_name: update.middle_name,
            position: update.position,
            ..Default::default()
        };

        self.store
            .update_user(user_id, user_update)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
