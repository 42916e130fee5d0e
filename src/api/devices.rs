use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, AppState, DeviceDto};
use crate::db::{DeviceConflict, DeviceInput};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ListDevicesResponse {
    pub devices: Vec<DeviceDto>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct DeviceResponse {
    pub device: DeviceDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload {
    pub device_name: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub asset_tag: Option<String>,
    pub date_purchased: Option<String>,
    pub responsible_person: Option<String>,
    pub location: Option<String>,
}

#[derive(Serialize)]
pub struct DeviceMessageResponse {
    pub message: String,
    pub device: DeviceDto,
}

#[derive(Serialize)]
pub struct SearchDevicesResponse {
    pub devices: Vec<DeviceDto>,
    pub total: usize,
    pub query: String,
}

impl DevicePayload {
    /// All seven fields are mandatory, on create and update alike.
    fn into_input(self) -> Result<DeviceInput, ApiError> {
        let input = DeviceInput {
            device_name: self.device_name.unwrap_or_default(),
            serial_number: self.serial_number.unwrap_or_default(),
            manufacturer: self.manufacturer.unwrap_or_default(),
            asset_tag: self.asset_tag.unwrap_or_default(),
            date_purchased: self.date_purchased.unwrap_or_default(),
            responsible_person: self.responsible_person.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
        };

        if input.device_name.is_empty()
            || input.serial_number.is_empty()
            || input.manufacturer.is_empty()
            || input.asset_tag.is_empty()
            || input.date_purchased.is_empty()
            || input.responsible_person.is_empty()
            || input.location.is_empty()
        {
            return Err(ApiError::missing_fields("All fields are required"));
        }

        Ok(input)
    }
}

fn conflict_error(conflict: DeviceConflict) -> ApiError {
    match conflict {
        DeviceConflict::SerialNumber => {
            ApiError::conflict("DUPLICATE_SERIAL_NUMBER", "Serial number already exists")
        }
        DeviceConflict::AssetTag => {
            ApiError::conflict("DUPLICATE_ASSET_TAG", "Asset tag already exists")
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /devices
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListDevicesResponse>, ApiError> {
    let devices = state.store().list_devices().await?;

    Ok(Json(ListDevicesResponse {
        total: devices.len(),
        devices: devices.into_iter().map(DeviceDto::from).collect(),
    }))
}

/// GET /devices/{id}
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = state
        .store()
        .get_device(id)
        .await?
        .ok_or_else(ApiError::device_not_found)?;

    Ok(Json(DeviceResponse {
        device: device.into(),
    }))
}

/// GET /devices/search/{query}
/// Substring match over name, serial, manufacturer, asset tag,
/// responsible person, and location.
pub async fn search_devices(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> Result<Json<SearchDevicesResponse>, ApiError> {
    let devices = state.store().search_devices(&query).await?;

    Ok(Json(SearchDevicesResponse {
        total: devices.len(),
        devices: devices.into_iter().map(DeviceDto::from).collect(),
        query,
    }))
}

/// POST /devices
/// Serial number and asset tag are unique across the fleet; a collision
/// is a 409 naming the offending column.
pub async fn create_device(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let input = payload.into_input()?;

    if let Some(conflict) = state
        .store()
        .find_device_conflict(&input.serial_number, &input.asset_tag, None)
        .await?
    {
        return Err(conflict_error(conflict));
    }

    let device = state.store().create_device(input).await?;

    tracing::info!(device_id = device.id, device_name = %device.device_name, "Device created");

    Ok((
        StatusCode::CREATED,
        Json(DeviceMessageResponse {
            message: "Device created successfully".to_string(),
            device: device.into(),
        }),
    ))
}

/// PUT /devices/{id}
/// Full replacement of all seven fields. Uniqueness checks exclude the
/// device being updated.
pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<DevicePayload>,
) -> Result<Json<DeviceMessageResponse>, ApiError> {
    let input = payload.into_input()?;

    if !state.store().device_exists(id).await? {
        return Err(ApiError::device_not_found());
    }

    if let Some(conflict) = state
        .store()
        .find_device_conflict(&input.serial_number, &input.asset_tag, Some(id))
        .await?
    {
        return Err(conflict_error(conflict));
    }

    let device = state
        .store()
        .update_device(id, input)
        .await?
        .ok_or_else(ApiError::device_not_found)?;

    Ok(Json(DeviceMessageResponse {
        message: "Device updated successfully".to_string(),
        device: device.into(),
    }))
}

/// DELETE /devices/{id}
/// Cascades to the device's checklists, PM logs, and QR tokens.
pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<DeviceMessageResponse>, ApiError> {
    let device = state
        .store()
        .get_device(id)
        .await?
        .ok_or_else(ApiError::device_not_found)?;

    state.store().delete_device(id).await?;

    tracing::info!(device_id = id, "Device deleted");

    Ok(Json(DeviceMessageResponse {
        message: "Device deleted successfully".to_string(),
        device: device.into(),
    }))
}
