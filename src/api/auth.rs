use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cookies::{self, REFRESH_COOKIE};
use super::{ApiError, AppState, UserDto};
use crate::services::AuthError;
use crate::services::auth_service::ProfileUpdate;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserDto,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Serialize)]
pub struct ChangePasswordResponse {
    pub message: String,
    pub token: String,
    pub user: UserDto,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: UserDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub position: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: UserDto,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Auth context
// ============================================================================

/// Who a request is acting as, inserted into request extensions by the
/// gate middleware. `Identity` comes from a bearer access token;
/// `Capability` comes from a QR token and is pinned to one device.
#[derive(Debug, Clone)]
pub enum AuthContext {
    Identity {
        user_id: i32,
        username: String,
        role: String,
    },
    Capability {
        device_id: i32,
    },
}

impl AuthContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Identity { role, .. } if role == "admin")
    }

    /// The signed-in user behind this context. Capability contexts are
    /// refused: routes that call this need a real account.
    pub fn identity(&self) -> Result<(i32, &str, &str), ApiError> {
        match self {
            Self::Identity {
                user_id,
                username,
                role,
            } => Ok((*user_id, username, role)),
            Self::Capability { .. } => Err(ApiError::Unauthorized {
                code: "NO_TOKEN",
                message: "Access denied. No token provided.".to_string(),
            }),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Maps authentication failures to the codes the gate itself emits.
/// Differs from the blanket `From<AuthError>` in one spot: a user
/// deleted out from under a live token is a 401 here, not a 404.
fn gate_error(err: AuthError) -> ApiError {
    match err {
        AuthError::UserNotFound => ApiError::Unauthorized {
            code: "USER_NOT_FOUND",
            message: "User not found.".to_string(),
        },
        other => other.into(),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// Pulls a QR token out of `?qrToken=` or the `x-qr-token` header.
fn extract_qr_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(raw) = query {
        for pair in raw.split('&') {
            if let Some((key, value)) = pair.split_once('=')
                && key == "qrToken"
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
    }

    headers
        .get("x-qr-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Bearer-token gate for every protected route. Verifies the access
/// token and re-fetches the user so deleted accounts are locked out
/// before their tokens expire.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer(&headers) else {
        return Err(ApiError::Unauthorized {
            code: "NO_TOKEN",
            message: "Access denied. No token provided.".to_string(),
        });
    };

    let user = state
        .auth_service()
        .authenticate_bearer(&token)
        .await
        .map_err(gate_error)?;

    tracing::Span::current().record("user_id", user.id);

    request.extensions_mut().insert(AuthContext::Identity {
        user_id: user.id,
        username: user.username,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Gate for the two read-only routes a QR token can reach. A QR token
/// grants a device-pinned capability context; anything else falls back
/// to the bearer path. Validation counts as an access on the token.
pub async fn auth_or_qr_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let qr_token = extract_qr_token(&headers, request.uri().query());

    if let Some(token) = qr_token {
        let access = state.qr_service().validate(&token).await?;

        request.extensions_mut().insert(AuthContext::Capability {
            device_id: access.device_id,
        });

        return Ok(next.run(request).await);
    }

    auth_middleware(State(state), headers, request, next).await
}

/// Admin gate, layered inside `auth_middleware` so the extension is
/// already populated. Capability contexts never pass.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(AuthContext::is_admin);

    if !is_admin {
        return Err(ApiError::Forbidden {
            code: "FORBIDDEN",
            message: "Access denied. Admin only.".to_string(),
        });
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Verifies credentials, returns an access token in the body and plants
/// the refresh token as an HTTP-only cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if username.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest {
            code: "MISSING_CREDENTIALS",
            message: "Username and password are required".to_string(),
        });
    }

    let result = state.auth_service().login(&username, &password).await?;

    let secure = state.config().read().await.server.secure_cookies;
    let cookie = cookies::refresh_cookie(&result.refresh_token, result.refresh_ttl_secs, secure)?;

    tracing::info!(username = %result.user.username, "User logged in");

    let mut response = Json(LoginResponse {
        message: "Login successful".to_string(),
        token: result.token,
        user: result.user.into(),
    })
    .into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);

    Ok(response)
}

/// POST /auth/refresh
/// Redeems the refresh cookie for a fresh access token. The cookie
/// itself is left alone; one refresh token serves its whole lifetime.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Some(token) = cookies::get_cookie(&headers, REFRESH_COOKIE) else {
        return Err(ApiError::Unauthorized {
            code: "NO_REFRESH_TOKEN",
            message: "Refresh token not found".to_string(),
        });
    };

    let result = state.auth_service().refresh(&token).await?;

    Ok(Json(RefreshResponse {
        message: "Token refreshed successfully".to_string(),
        token: result.token,
    }))
}

/// GET /auth/verify
/// Confirms the bearer token still maps to a live account.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let (user_id, _, _) = ctx.identity()?;

    let user = state.auth_service().profile(user_id).await?;

    Ok(Json(VerifyResponse {
        valid: true,
        user: user.into(),
    }))
}

/// POST /auth/logout
/// Deletes the presented refresh token and clears the cookie. Both are
/// idempotent: logging out twice is not an error.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = cookies::get_cookie(&headers, REFRESH_COOKIE) {
        state.auth_service().logout(&token).await?;
    }

    let secure = state.config().read().await.server.secure_cookies;
    let cookie = cookies::clear_refresh_cookie(secure)?;

    let mut response = Json(MessageResponse {
        message: "Logout successful".to_string(),
    })
    .into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);

    Ok(response)
}

/// POST /auth/change-password
/// Verifies the current password, applies strength and reuse policy,
/// and hands back a fresh access token minted after the change.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, ApiError> {
    let (user_id, _, _) = ctx.identity()?;

    let current = payload.current_password.unwrap_or_default();
    let new = payload.new_password.unwrap_or_default();

    if current.is_empty() || new.is_empty() {
        return Err(ApiError::missing_fields(
            "Current password and new password are required",
        ));
    }

    let result = state
        .auth_service()
        .change_password(user_id, &current, &new)
        .await?;

    tracing::info!(user_id, "Password changed");

    Ok(Json(ChangePasswordResponse {
        message: "Password changed successfully".to_string(),
        token: result.token,
        user: result.user.into(),
    }))
}

/// GET /auth/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let (user_id, _, _) = ctx.identity()?;

    let user = state.auth_service().profile(user_id).await?;

    Ok(Json(ProfileResponse { user: user.into() }))
}

/// PUT /auth/profile
/// Self-service update of name and position fields.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, ApiError> {
    let (user_id, _, _) = ctx.identity()?;

    let update = ProfileUpdate {
        last_name: payload.last_name,
        first_name: payload.first_name,
        middle_name: payload.middle_name,
        position: payload.position,
    };

    let user = state.auth_service().update_profile(user_id, update).await?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully".to_string(),
        user: user.into(),
    }))
}
