use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthContext;
use super::{ApiError, AppState, ChecklistDto, ChecklistTaskDto};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ListChecklistsResponse {
    pub checklists: Vec<ChecklistDto>,
}

#[derive(Serialize)]
pub struct ChecklistWithTasksResponse {
    pub checklist: ChecklistDto,
    pub tasks: Vec<ChecklistTaskDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChecklistRequest {
    pub device_id: Option<i32>,
    pub maintenance_types: Option<Vec<String>>,
    pub task_frequency: Option<String>,
    pub tasks: Option<Vec<TaskPayload>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub task_description: Option<String>,
}

#[derive(Serialize)]
pub struct CreateChecklistResponse {
    pub message: String,
    pub checklist: ChecklistDto,
    pub tasks: Vec<ChecklistTaskDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChecklistRequest {
    pub maintenance_types: Option<Vec<String>>,
    pub task_frequency: Option<String>,
}

#[derive(Serialize)]
pub struct ChecklistMessageResponse {
    pub message: String,
    pub checklist: ChecklistDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub is_completed: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptionRequest {
    pub task_description: Option<String>,
}

#[derive(Serialize)]
pub struct TaskMessageResponse {
    pub message: String,
    pub task: ChecklistTaskDto,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /pm-checklists
pub async fn list_checklists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListChecklistsResponse>, ApiError> {
    let checklists = state.store().list_checklists().await?;

    Ok(Json(ListChecklistsResponse {
        checklists: checklists.into_iter().map(ChecklistDto::from).collect(),
    }))
}

/// GET /pm-checklists/{id}
pub async fn get_checklist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ChecklistWithTasksResponse>, ApiError> {
    let (checklist, tasks) = state
        .store()
        .get_checklist_with_tasks(id)
        .await?
        .ok_or_else(ApiError::checklist_not_found)?;

    Ok(Json(ChecklistWithTasksResponse {
        checklist: checklist.into(),
        tasks: tasks.into_iter().map(ChecklistTaskDto::from).collect(),
    }))
}

/// POST /pm-checklists
/// Creates one checklist carrying all requested maintenance types, plus
/// its tasks, in a single transaction. The device's descriptive fields
/// are snapshotted onto the checklist row.
pub async fn create_checklist(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateChecklistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device_id = payload.device_id.unwrap_or_default();
    let maintenance_types = payload.maintenance_types.unwrap_or_default();
    let task_frequency = payload.task_frequency.unwrap_or_default();

    if device_id == 0
        || maintenance_types.is_empty()
        || task_frequency.is_empty()
        || payload.tasks.is_none()
    {
        return Err(ApiError::missing_fields(
            "Device ID, maintenance types array, task frequency, and tasks array are required",
        ));
    }

    let tasks = payload.tasks.unwrap_or_default();
    if tasks.is_empty() {
        return Err(ApiError::BadRequest {
            code: "NO_TASKS",
            message: "At least one task is required".to_string(),
        });
    }

    let device = state
        .store()
        .get_device(device_id)
        .await?
        .ok_or_else(ApiError::device_not_found)?;

    let mut descriptions = Vec::with_capacity(tasks.len());
    for task in tasks {
        let description = task.task_description.unwrap_or_default();
        if description.trim().is_empty() {
            return Err(ApiError::missing_fields("Task description cannot be empty"));
        }
        descriptions.push(description);
    }

    let (checklist, created_tasks) = state
        .store()
        .create_checklist_with_tasks(&device, &maintenance_types, &task_frequency, &descriptions)
        .await?;

    tracing::info!(
        checklist_id = checklist.id,
        device_id,
        task_count = created_tasks.len(),
        "Checklist created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateChecklistResponse {
            message: "Checklist created successfully".to_string(),
            checklist: checklist.into(),
            tasks: created_tasks
                .into_iter()
                .map(ChecklistTaskDto::from)
                .collect(),
        }),
    ))
}

/// PUT /pm-checklists/{id}
/// Partial update of the maintenance types and frequency; absent fields
/// keep their stored values.
pub async fn update_checklist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateChecklistRequest>,
) -> Result<Json<ChecklistMessageResponse>, ApiError> {
    state
        .store()
        .get_checklist(id)
        .await?
        .ok_or_else(ApiError::checklist_not_found)?;

    if let Some(types) = payload.maintenance_types.as_deref()
        && types.is_empty()
    {
        return Err(ApiError::BadRequest {
            code: "INVALID_MAINTENANCE_TYPES",
            message: "Maintenance types must be a non-empty array".to_string(),
        });
    }

    let checklist = state
        .store()
        .update_checklist(
            id,
            payload.maintenance_types.as_deref(),
            payload.task_frequency.as_deref(),
        )
        .await?
        .ok_or_else(ApiError::checklist_not_found)?;

    Ok(Json(ChecklistMessageResponse {
        message: "Checklist updated successfully".to_string(),
        checklist: checklist.into(),
    }))
}

/// DELETE /pm-checklists/{id}
/// Cascades to the checklist's tasks.
pub async fn delete_checklist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ChecklistMessageResponse>, ApiError> {
    let checklist = state
        .store()
        .get_checklist(id)
        .await?
        .ok_or_else(ApiError::checklist_not_found)?;

    state.store().delete_checklist(id).await?;

    tracing::info!(checklist_id = id, "Checklist deleted");

    Ok(Json(ChecklistMessageResponse {
        message: "Checklist deleted successfully".to_string(),
        checklist: checklist.into(),
    }))
}

/// POST /pm-checklists/{id}/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<TaskDescriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store()
        .get_checklist(id)
        .await?
        .ok_or_else(ApiError::checklist_not_found)?;

    let description = payload.task_description.unwrap_or_default();
    if description.trim().is_empty() {
        return Err(ApiError::missing_fields("Task description is required"));
    }

    let task = state.store().add_checklist_task(id, &description).await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskMessageResponse {
            message: "Task created successfully".to_string(),
            task: task.into(),
        }),
    ))
}

/// PUT /pm-checklists/tasks/{task_id}
/// Completion toggle. Completing stamps the session user and the time;
/// unchecking clears both. Notes are replaced wholesale, absent means
/// cleared.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskMessageResponse>, ApiError> {
    let (_, username, _) = ctx.identity()?;

    let is_completed = payload.is_completed.unwrap_or(false);

    let task = state
        .store()
        .set_checklist_task_completion(task_id, is_completed, payload.notes, username)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(TaskMessageResponse {
        message: "Task updated successfully".to_string(),
        task: task.into(),
    }))
}

/// PUT /pm-checklists/tasks/{task_id}/description
pub async fn update_task_description(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i32>,
    Json(payload): Json<TaskDescriptionRequest>,
) -> Result<Json<TaskMessageResponse>, ApiError> {
    state
        .store()
        .get_checklist_task(task_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    let description = payload.task_description.unwrap_or_default();
    if description.trim().is_empty() {
        return Err(ApiError::missing_fields("Task description is required"));
    }

    let task = state
        .store()
        .update_checklist_task_description(task_id, &description)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(TaskMessageResponse {
        message: "Task description updated successfully".to_string(),
        task: task.into(),
    }))
}

/// DELETE /pm-checklists/tasks/{task_id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i32>,
) -> Result<Json<TaskMessageResponse>, ApiError> {
    let task = state
        .store()
        .delete_checklist_task(task_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(TaskMessageResponse {
        message: "Task deleted successfully".to_string(),
        task: task.into(),
    }))
}
