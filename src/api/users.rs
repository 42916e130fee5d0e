use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthContext;
use super::{ApiError, AppState, PaginationDto, UserDto};
use crate::db::{NewUser, UserStats, UserUpdate};
use crate::services::password_policy;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserDto>,
    pub pagination: PaginationDto,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: UserDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: UserDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct UserStatsResponse {
    pub statistics: UserStats,
}

fn invalid_role() -> ApiError {
    ApiError::BadRequest {
        code: "INVALID_ROLE",
        message: "Invalid role. Must be 'admin' or 'user'".to_string(),
    }
}

fn weak_password(detail: &str) -> ApiError {
    ApiError::BadRequest {
        code: "WEAK_PASSWORD",
        message: format!("Password is too weak: must include {detail}"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users
/// Paginated listing with optional name search and role filter.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).max(1);

    let (users, total) = state
        .store()
        .list_users(page, limit, query.search.as_deref(), query.role.as_deref())
        .await?;

    Ok(Json(ListUsersResponse {
        users: users.into_iter().map(UserDto::from).collect(),
        pagination: PaginationDto {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    }))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    Ok(Json(UserResponse { user: user.into() }))
}

/// POST /users
/// Provisions an account. The password must pass the full strength
/// policy and the account starts with the forced-change flag set.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let first_name = payload.first_name.unwrap_or_default();
    let middle_name = payload.middle_name.unwrap_or_default();
    let last_name = payload.last_name.unwrap_or_default();
    let position = payload.position.unwrap_or_default();
    let role = payload.role.unwrap_or_else(|| "user".to_string());

    if username.is_empty()
        || password.is_empty()
        || first_name.is_empty()
        || last_name.is_empty()
        || middle_name.is_empty()
        || position.is_empty()
    {
        return Err(ApiError::missing_fields("All fields are required"));
    }

    let strength = password_policy::validate_strength(&password);
    if !strength.is_valid() {
        return Err(weak_password(&strength.failed_requirements().join(", ")));
    }

    if role != "admin" && role != "user" {
        return Err(invalid_role());
    }

    if state.store().username_exists(&username).await? {
        return Err(ApiError::conflict(
            "USERNAME_EXISTS",
            "Username already exists",
        ));
    }

    let security = state.config().read().await.security.clone();
    let user = state
        .store()
        .create_user(
            NewUser {
                username,
                password,
                last_name,
                first_name,
                middle_name,
                position,
                role,
            },
            &security,
        )
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User created");

    Ok((
        StatusCode::CREATED,
        Json(UserMessageResponse {
            message: "User created successfully".to_string(),
            user: user.into(),
        }),
    ))
}

/// PUT /users/{id}
/// Partial update of profile fields, role, and password. An admin reset
/// records the old hash in history and forces a change on next login.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserMessageResponse>, ApiError> {
    state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    if let Some(role) = payload.role.as_deref()
        && role != "admin"
        && role != "user"
    {
        return Err(invalid_role());
    }

    let new_password = payload.password.filter(|p| !p.is_empty());

    let update = UserUpdate {
        last_name: payload.last_name,
        first_name: payload.first_name,
        middle_name: payload.middle_name,
        position: payload.position,
        role: payload.role,
        ..UserUpdate::default()
    };

    if new_password.is_none() && update.is_empty() {
        return Err(ApiError::BadRequest {
            code: "NO_UPDATES",
            message: "No fields to update".to_string(),
        });
    }

    if let Some(password) = new_password {
        let strength = password_policy::validate_strength(&password);
        if !strength.is_valid() {
            return Err(weak_password(&strength.failed_requirements().join(", ")));
        }

        let security = state.config().read().await.security.clone();
        state
            .store()
            .reset_password(id, &password, &security)
            .await?
            .ok_or_else(ApiError::user_not_found)?;

        tracing::info!(user_id = id, "Password reset by admin");
    }

    if !update.is_empty() {
        state
            .store()
            .update_user(id, update)
            .await?
            .ok_or_else(ApiError::user_not_found)?;
    }

    let user = state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    Ok(Json(UserMessageResponse {
        message: "User updated successfully".to_string(),
        user: user.into(),
    }))
}

/// DELETE /users/{id}
/// Removes an account and, by cascade, its password history and refresh
/// tokens. Admins cannot delete themselves.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (caller_id, _, _) = ctx.identity()?;

    if caller_id == id {
        return Err(ApiError::BadRequest {
            code: "SELF_DELETE",
            message: "You cannot delete your own account".to_string(),
        });
    }

    let deleted = state.store().delete_user(id).await?;
    if !deleted {
        return Err(ApiError::user_not_found());
    }

    tracing::info!(user_id = id, "User deleted");

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

/// GET /users/stats/overview
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UserStatsResponse>, ApiError> {
    let statistics = state.store().user_stats().await?;

    Ok(Json(UserStatsResponse { statistics }))
}
