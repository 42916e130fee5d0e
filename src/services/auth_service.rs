//! Domain service for authentication and session management.
//!
//! Handles login, access token refresh, logout, bearer authentication,
//! password changes, and the caller's own profile.

use thiserror::Error;

use crate::db::User;
use crate::services::tokens::TokenError;

/// Errors specific to authentication operations. Variants are precise on
/// purpose: the API layer maps each to a stable machine code.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    InvalidCurrentPassword,

    #[error("Password is too weak: must include {0}")]
    WeakPassword(String),

    #[error("Cannot reuse any of your previous passwords")]
    PasswordReused,

    #[error("Refresh token not found")]
    NoRefreshToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Access token required")]
    NoToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token verification failed: {0}")]
    TokenVerification(String),

    #[error("User not found")]
    UserNotFound,

    #[error("No fields provided to update")]
    NoUpdates,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid => Self::InvalidToken,
            TokenError::Verification(msg) => Self::TokenVerification(msg),
        }
    }
}

/// Result of a successful login. The refresh token is handed back raw;
/// the API layer turns it into an HTTP-only cookie.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub refresh_token: String,
    pub refresh_ttl_secs: i64,
    pub user: User,
}

/// Result of redeeming a refresh token
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub token: String,
}

/// Result of a successful password change: a fresh access token so the
/// client does not keep working on claims minted before the change.
#[derive(Debug, Clone)]
pub struct ChangePasswordResult {
    pub token: String,
    pub user: User,
}

/// Self-service profile update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub position: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.last_name.is_none()
            && self.first_name.is_none()
            && self.middle_name.is_none()
            && self.position.is_none()
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials, mints an access token and a refresh token,
    /// and persists the refresh token. Expired refresh rows are swept
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on a bad username or
    /// password, undifferentiated on purpose.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Redeems a stored refresh token for a fresh access token. The
    /// refresh token itself is not rotated.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidRefreshToken`] when the row is absent,
    /// [`AuthError::RefreshTokenExpired`] when it expired (the row is
    /// deleted on the spot), [`AuthError::UserNotFound`] when the owner
    /// is gone.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError>;

    /// Deletes the presented refresh token; absent rows are not an error.
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Verifies a bearer access token and re-fetches its user, so that a
    /// deleted account is locked out even while its tokens are unexpired.
    async fn authenticate_bearer(&self, token: &str) -> Result<User, AuthError>;

    /// Changes the caller's password: current password verified, new one
    /// checked for strength and reuse, old hash retained in history.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordResult, AuthError>;

    /// The caller's own profile.
    async fn profile(&self, user_id: i32) -> Result<User, AuthError>;

    /// Self-service update of name and position fields.
    async fn update_profile(
        &self,
        user_id: i32,
        update: ProfileUpdate,
    ) -> Result<User, AuthError>;
}
