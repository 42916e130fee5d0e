//! Shared wire DTOs. Success bodies are flat camelCase JSON; each DTO
//! converts from the corresponding storage row.

use serde::Serialize;

use crate::db::{Checklist, ChecklistTask, Device, PmLog, PmLogTask, PmLogWithCounts, User};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub position: String,
    pub role: String,
    pub profile_picture: Option<String>,
    pub must_change_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            last_name: user.last_name,
            first_name: user.first_name,
            middle_name: user.middle_name,
            position: user.position,
            role: user.role,
            profile_picture: user.profile_picture,
            must_change_password: user.must_change_password,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub id: i32,
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub asset_tag: String,
    pub date_purchased: String,
    pub responsible_person: String,
    pub location: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Device> for DeviceDto {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            device_name: device.device_name,
            serial_number: device.serial_number,
            manufacturer: device.manufacturer,
            asset_tag: device.asset_tag,
            date_purchased: device.date_purchased,
            responsible_person: device.responsible_person,
            location: device.location,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistDto {
    pub id: i32,
    pub device_id: i32,
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub asset_tag: String,
    pub date_purchased: String,
    pub responsible_person: String,
    pub location: String,
    pub maintenance_types: Vec<String>,
    pub task_frequency: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Checklist> for ChecklistDto {
    fn from(checklist: Checklist) -> Self {
        let maintenance_types = parse_maintenance_types(&checklist.maintenance_types);
        Self {
            id: checklist.id,
            device_id: checklist.device_id,
            device_name: checklist.device_name,
            serial_number: checklist.serial_number,
            manufacturer: checklist.manufacturer,
            asset_tag: checklist.asset_tag,
            date_purchased: checklist.date_purchased,
            responsible_person: checklist.responsible_person,
            location: checklist.location,
            maintenance_types,
            task_frequency: checklist.task_frequency,
            created_at: checklist.created_at,
            updated_at: checklist.updated_at,
        }
    }
}

/// The column stores a JSON array. Rows written before the multi-type
/// refactor hold a single bare label; those come back as a one-element list.
fn parse_maintenance_types(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|_| vec![raw.to_string()])
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistTaskDto {
    pub id: i32,
    pub checklist_id: i32,
    pub task_description: String,
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ChecklistTask> for ChecklistTaskDto {
    fn from(task: ChecklistTask) -> Self {
        Self {
            id: task.id,
            checklist_id: task.checklist_id,
            task_description: task.task_description,
            is_completed: task.is_completed,
            completed_by: task.completed_by,
            completed_at: task.completed_at,
            notes: task.notes,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmLogDto {
    pub id: i32,
    pub device_id: i32,
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub date: String,
    pub fully_functional: String,
    pub recommendation: Option<String>,
    pub performed_by: String,
    pub validated_by: Option<String>,
    pub acknowledged_by: Option<String>,
    pub findings_solutions: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PmLog> for PmLogDto {
    fn from(log: PmLog) -> Self {
        Self {
            id: log.id,
            device_id: log.device_id,
            device_name: log.device_name,
            serial_number: log.serial_number,
            manufacturer: log.manufacturer,
            date: log.date,
            fully_functional: log.fully_functional,
            recommendation: log.recommendation,
            performed_by: log.performed_by,
            validated_by: log.validated_by,
            acknowledged_by: log.acknowledged_by,
            findings_solutions: log.findings_solutions,
            created_at: log.created_at,
            updated_at: log.updated_at,
        }
    }
}

/// A log row flattened together with its task completion counts, used by
/// the per-device history view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmLogWithCountsDto {
    #[serde(flatten)]
    pub log: PmLogDto,
    pub total_tasks: u64,
    pub checked_tasks: u64,
}

impl From<PmLogWithCounts> for PmLogWithCountsDto {
    fn from(row: PmLogWithCounts) -> Self {
        Self {
            log: row.log.into(),
            total_tasks: row.total_tasks,
            checked_tasks: row.checked_tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmLogTaskDto {
    pub id: i32,
    pub pm_log_id: i32,
    pub task_description: String,
    pub maintenance_type: String,
    pub is_checked: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PmLogTask> for PmLogTaskDto {
    fn from(task: PmLogTask) -> Self {
        Self {
            id: task.id,
            pm_log_id: task.pm_log_id,
            task_description: task.task_description,
            maintenance_type: task.maintenance_type,
            is_checked: task.is_checked,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maintenance_types_json_array() {
        let parsed = parse_maintenance_types(r#"["Hardware Maintenance","Power Source"]"#);
        assert_eq!(parsed, vec!["Hardware Maintenance", "Power Source"]);
    }

    #[test]
    fn test_maintenance_types_legacy_bare_label() {
        let parsed = parse_maintenance_types("Hardware Maintenance");
        assert_eq!(parsed, vec!["Hardware Maintenance"]);
    }

    #[test]
    fn test_user_dto_camel_case_wire_names() {
        let dto = UserDto {
            id: 1,
            username: "jdoe".to_string(),
            last_name: "Doe".to_string(),
            first_name: "Jane".to_string(),
            middle_name: "Q".to_string(),
            position: "Technician".to_string(),
            role: "user".to_string(),
            profile_picture: None,
            must_change_password: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["mustChangePassword"], true);
        assert_eq!(json["lastName"], "Doe");
        assert!(json.get("must_change_password").is_none());
    }
}
