use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthContext;
use super::{ApiError, AppState};
use crate::services::qr_service::QrTokenInfo;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub device_id: Option<i32>,
    pub expires_in_hours: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub message: String,
    pub token: String,
    pub qr_url: String,
    pub device_id: i32,
    pub device_name: String,
    pub expires_at: String,
    pub expires_in_hours: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub device_id: i32,
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub location: String,
    pub expires_at: String,
    pub access_count: i32,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct ListTokensResponse {
    pub tokens: Vec<QrTokenInfo>,
    pub total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub message: String,
    pub deleted_count: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /qr-tokens/generate
/// Issues a capability token for one device and returns the URL to
/// print on the placard. TTL is caller-chosen and uncapped.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, _, _) = ctx.identity()?;

    let Some(device_id) = payload.device_id else {
        return Err(ApiError::BadRequest {
            code: "MISSING_DEVICE_ID",
            message: "Device ID is required".to_string(),
        });
    };

    let generated = state
        .qr_service()
        .generate(device_id, user_id, payload.expires_in_hours)
        .await?;

    tracing::info!(device_id, user_id, "QR token generated");

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            message: "QR token generated successfully".to_string(),
            token: generated.token,
            qr_url: generated.qr_url,
            device_id: generated.device_id,
            device_name: generated.device_name,
            expires_at: generated.expires_at,
            expires_in_hours: generated.expires_in_hours,
        }),
    ))
}

/// GET /qr-tokens/validate/{token}
/// Public endpoint backing the QR landing page. A valid token reveals
/// the device identity and counts as an access.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ValidateResponse>, ApiError> {
    if token.trim().is_empty() {
        return Err(ApiError::BadRequest {
            code: "MISSING_TOKEN",
            message: "Token is required".to_string(),
        });
    }

    let access = state.qr_service().validate(&token).await?;

    Ok(Json(ValidateResponse {
        valid: true,
        device_id: access.device_id,
        device_name: access.device_name,
        serial_number: access.serial_number,
        manufacturer: access.manufacturer,
        location: access.location,
        expires_at: access.expires_at,
        access_count: access.access_count,
    }))
}

/// DELETE /qr-tokens/revoke/{token}
/// Immediate revocation. Only the issuer or an admin may revoke.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (user_id, _, _) = ctx.identity()?;

    state
        .qr_service()
        .revoke(&token, user_id, ctx.is_admin())
        .await?;

    tracing::info!(user_id, "QR token revoked");

    Ok(Json(MessageResponse {
        message: "QR token revoked successfully".to_string(),
    }))
}

/// GET /qr-tokens/device/{device_id}
/// Every token for a device, expired ones included, for the admin view.
pub async fn list_for_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<i32>,
) -> Result<Json<ListTokensResponse>, ApiError> {
    let tokens = state.qr_service().list_for_device(device_id).await?;

    Ok(Json(ListTokensResponse {
        total: tokens.len(),
        tokens,
    }))
}

/// POST /qr-tokens/cleanup
/// Deletes every expired token; meant for a cron job or a manual sweep.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let deleted_count = state.qr_service().cleanup_expired().await?;

    tracing::info!(deleted_count, "Expired QR tokens cleaned up");

    Ok(Json(CleanupResponse {
        message: "Expired tokens cleaned up successfully".to_string(),
        deleted_count,
    }))
}
