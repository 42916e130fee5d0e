use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::AuthContext;
use super::{ApiError, AppState, PmLogDto, PmLogTaskDto, PmLogWithCountsDto};
use crate::db::{DeviceLogRollup, NewPmLog, PmLogFilters, PmLogTotals, PmLogUpdate};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPmLogsQuery {
    pub device_id: Option<i32>,
    pub fully_functional: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct ListPmLogsResponse {
    pub logs: Vec<PmLogDto>,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

/// Device identity header on the history view. Deliberately slim: the
/// QR placard audience gets no purchase or custody details.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHeaderDto {
    pub id: i32,
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub location: String,
}

#[derive(Serialize)]
pub struct DeviceHistoryResponse {
    pub device: DeviceHeaderDto,
    #[serde(rename = "lastPMDate")]
    pub last_pm_date: Option<String>,
    #[serde(rename = "lastPMPerformedBy")]
    pub last_pm_performed_by: Option<String>,
    pub logs: Vec<PmLogWithCountsDto>,
    pub total: usize,
    #[serde(rename = "accessMode")]
    pub access_mode: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub checked_tasks: usize,
    pub unchecked_tasks: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmLogDetailResponse {
    pub log: PmLogDto,
    pub tasks: Vec<PmLogTaskDto>,
    pub tasks_by_type: BTreeMap<String, Vec<PmLogTaskDto>>,
    pub statistics: TaskStats,
    pub access_mode: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePmLogRequest {
    pub device_id: Option<i32>,
    pub date: Option<String>,
    pub fully_functional: Option<String>,
    pub recommendation: Option<String>,
    pub performed_by: Option<String>,
    pub validated_by: Option<String>,
    pub acknowledged_by: Option<String>,
    pub findings_solutions: Option<String>,
}

#[derive(Serialize)]
pub struct CreatePmLogResponse {
    pub message: String,
    pub log: PmLogDto,
    pub tasks: Vec<PmLogTaskDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePmLogRequest {
    pub date: Option<String>,
    pub fully_functional: Option<String>,
    pub recommendation: Option<String>,
    pub performed_by: Option<String>,
    pub validated_by: Option<String>,
    pub acknowledged_by: Option<String>,
    pub findings_solutions: Option<String>,
}

#[derive(Serialize)]
pub struct PmLogMessageResponse {
    pub message: String,
    pub log: PmLogDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLogTaskRequest {
    pub is_checked: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLogTaskRequest {
    pub task_description: Option<String>,
    pub maintenance_type: Option<String>,
}

#[derive(Serialize)]
pub struct LogTaskMessageResponse {
    pub message: String,
    pub task: PmLogTaskDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    pub statistics: PmLogTotals,
    pub logs_by_device: Vec<DeviceLogRollup>,
}

fn access_mode(ctx: &AuthContext) -> &'static str {
    match ctx {
        AuthContext::Capability { .. } => "qr",
        AuthContext::Identity { .. } => "authenticated",
    }
}

fn device_mismatch() -> ApiError {
    ApiError::Forbidden {
        code: "DEVICE_MISMATCH",
        message: "QR token is not valid for this device".to_string(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /pm-logs
pub async fn list_pm_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPmLogsQuery>,
) -> Result<Json<ListPmLogsResponse>, ApiError> {
    let filters = PmLogFilters {
        device_id: query.device_id,
        fully_functional: query.fully_functional,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let logs = state.store().list_pm_logs(&filters).await?;

    Ok(Json(ListPmLogsResponse {
        total: logs.len(),
        logs: logs.into_iter().map(PmLogDto::from).collect(),
    }))
}

/// GET /pm-logs/device/{device_id}
/// Maintenance history for one device, reachable with a QR capability
/// token. A capability pinned to another device is refused.
pub async fn device_history(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(device_id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<DeviceHistoryResponse>, ApiError> {
    if let AuthContext::Capability {
        device_id: granted_device,
    } = ctx
        && granted_device != device_id
    {
        return Err(device_mismatch());
    }

    let device = state
        .store()
        .get_device(device_id)
        .await?
        .ok_or_else(ApiError::device_not_found)?;

    let limit = query.limit.unwrap_or(10);
    let history = state.store().device_pm_history(device_id, limit).await?;

    let last = history.first();
    let last_pm_date = last.map(|entry| entry.log.date.clone());
    let last_pm_performed_by = last.map(|entry| entry.log.performed_by.clone());

    Ok(Json(DeviceHistoryResponse {
        device: DeviceHeaderDto {
            id: device.id,
            device_name: device.device_name,
            serial_number: device.serial_number,
            manufacturer: device.manufacturer,
            location: device.location,
        },
        last_pm_date,
        last_pm_performed_by,
        total: history.len(),
        logs: history.into_iter().map(PmLogWithCountsDto::from).collect(),
        access_mode: access_mode(&ctx),
    }))
}

/// GET /pm-logs/{id}
/// One log with its tasks grouped by maintenance type. Also reachable
/// with a QR capability token, checked against the log's device.
pub async fn get_pm_log(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<Json<PmLogDetailResponse>, ApiError> {
    let (log, tasks) = state
        .store()
        .get_pm_log_with_tasks(id)
        .await?
        .ok_or_else(ApiError::pm_log_not_found)?;

    if let AuthContext::Capability {
        device_id: granted_device,
    } = ctx
        && granted_device != log.device_id
    {
        return Err(device_mismatch());
    }

    let tasks: Vec<PmLogTaskDto> = tasks.into_iter().map(PmLogTaskDto::from).collect();

    let mut tasks_by_type: BTreeMap<String, Vec<PmLogTaskDto>> = BTreeMap::new();
    for task in &tasks {
        tasks_by_type
            .entry(task.maintenance_type.clone())
            .or_default()
            .push(task.clone());
    }

    let checked_tasks = tasks.iter().filter(|t| t.is_checked).count();
    let statistics = TaskStats {
        total_tasks: tasks.len(),
        checked_tasks,
        unchecked_tasks: tasks.len() - checked_tasks,
    };

    Ok(Json(PmLogDetailResponse {
        log: log.into(),
        tasks,
        tasks_by_type,
        statistics,
        access_mode: access_mode(&ctx),
    }))
}

/// POST /pm-logs
/// Records a maintenance visit. Every task of the device's checklists
/// is copied onto the log in the same transaction, so the log is a
/// self-contained snapshot of what was due that day.
pub async fn create_pm_log(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePmLogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device_id = payload.device_id.unwrap_or_default();
    let date = payload.date.unwrap_or_default();
    let fully_functional = payload.fully_functional.unwrap_or_default();
    let performed_by = payload.performed_by.unwrap_or_default();

    if device_id == 0 || date.is_empty() || fully_functional.is_empty() || performed_by.is_empty()
    {
        return Err(ApiError::missing_fields(
            "Device ID, date, fully functional status, and performed by are required",
        ));
    }

    let device = state
        .store()
        .get_device(device_id)
        .await?
        .ok_or_else(ApiError::device_not_found)?;

    let (log, tasks) = state
        .store()
        .create_pm_log_with_tasks(
            &device,
            NewPmLog {
                date,
                fully_functional,
                recommendation: payload.recommendation,
                performed_by,
                validated_by: payload.validated_by,
                acknowledged_by: payload.acknowledged_by,
                findings_solutions: payload.findings_solutions,
            },
        )
        .await?;

    tracing::info!(
        log_id = log.id,
        device_id,
        task_count = tasks.len(),
        "PM log created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePmLogResponse {
            message: "PM log created successfully".to_string(),
            log: log.into(),
            tasks: tasks.into_iter().map(PmLogTaskDto::from).collect(),
        }),
    ))
}

/// PUT /pm-logs/{id}
/// Partial update; absent fields keep their stored values.
pub async fn update_pm_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePmLogRequest>,
) -> Result<Json<PmLogMessageResponse>, ApiError> {
    state
        .store()
        .get_pm_log(id)
        .await?
        .ok_or_else(ApiError::pm_log_not_found)?;

    let log = state
        .store()
        .update_pm_log(
            id,
            PmLogUpdate {
                date: payload.date,
                fully_functional: payload.fully_functional,
                recommendation: payload.recommendation,
                performed_by: payload.performed_by,
                validated_by: payload.validated_by,
                acknowledged_by: payload.acknowledged_by,
                findings_solutions: payload.findings_solutions,
            },
        )
        .await?
        .ok_or_else(ApiError::pm_log_not_found)?;

    Ok(Json(PmLogMessageResponse {
        message: "PM log updated successfully".to_string(),
        log: log.into(),
    }))
}

/// DELETE /pm-logs/{id}
/// Admin only; the log's tasks go with it.
pub async fn delete_pm_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<PmLogMessageResponse>, ApiError> {
    let log = state
        .store()
        .delete_pm_log(id)
        .await?
        .ok_or_else(ApiError::pm_log_not_found)?;

    tracing::info!(log_id = id, "PM log deleted");

    Ok(Json(PmLogMessageResponse {
        message: "PM log deleted successfully".to_string(),
        log: log.into(),
    }))
}

/// PUT /pm-logs/tasks/{task_id}
pub async fn update_log_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateLogTaskRequest>,
) -> Result<Json<LogTaskMessageResponse>, ApiError> {
    let Some(is_checked) = payload.is_checked else {
        return Err(ApiError::missing_fields("isChecked field is required"));
    };

    let task = state
        .store()
        .set_pm_log_task_checked(task_id, is_checked)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(LogTaskMessageResponse {
        message: "Task updated successfully".to_string(),
        task: task.into(),
    }))
}

/// POST /pm-logs/{id}/tasks
/// Manual task addition for work done outside the planned checklist.
pub async fn add_log_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<AddLogTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let description = payload.task_description.unwrap_or_default();
    let maintenance_type = payload.maintenance_type.unwrap_or_default();

    if description.is_empty() || maintenance_type.is_empty() {
        return Err(ApiError::missing_fields(
            "Task description and maintenance type are required",
        ));
    }

    state
        .store()
        .get_pm_log(id)
        .await?
        .ok_or_else(ApiError::pm_log_not_found)?;

    let task = state
        .store()
        .add_pm_log_task(id, &description, &maintenance_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LogTaskMessageResponse {
            message: "Task added successfully".to_string(),
            task: task.into(),
        }),
    ))
}

/// DELETE /pm-logs/tasks/{task_id}
/// Admin only.
pub async fn delete_log_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i32>,
) -> Result<Json<LogTaskMessageResponse>, ApiError> {
    let task = state
        .store()
        .delete_pm_log_task(task_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(LogTaskMessageResponse {
        message: "Task deleted successfully".to_string(),
        task: task.into(),
    }))
}

/// GET /pm-logs/statistics/overview
/// Fleet-wide totals plus a per-device rollup, optionally bounded by a
/// date window.
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let (statistics, logs_by_device) = state
        .store()
        .pm_log_statistics(query.start_date.as_deref(), query.end_date.as_deref())
        .await?;

    Ok(Json(StatisticsResponse {
        statistics,
        logs_by_device,
    }))
}
