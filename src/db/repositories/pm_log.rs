use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::{pm_checklists, pm_log_tasks, pm_logs, pm_tasks};

use super::device::Device;

pub use crate::entities::pm_log_tasks::Model as PmLogTask;
pub use crate::entities::pm_logs::Model as PmLog;

/// Optional filters for the log listing
#[derive(Debug, Clone, Default)]
pub struct PmLogFilters {
    pub device_id: Option<i32>,
    pub fully_functional: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Fields for a new log entry; device snapshot is taken from the device row
#[derive(Debug, Clone)]
pub struct NewPmLog {
    pub date: String,
    pub fully_functional: String,
    pub recommendation: Option<String>,
    pub performed_by: String,
    pub validated_by: Option<String>,
    pub acknowledged_by: Option<String>,
    pub findings_solutions: Option<String>,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct PmLogUpdate {
    pub date: Option<String>,
    pub fully_functional: Option<String>,
    pub recommendation: Option<String>,
    pub performed_by: Option<String>,
    pub validated_by: Option<String>,
    pub acknowledged_by: Option<String>,
    pub findings_solutions: Option<String>,
}

/// Log row plus its task completion counts
#[derive(Debug, Clone)]
pub struct PmLogWithCounts {
    pub log: PmLog,
    pub total_tasks: u64,
    pub checked_tasks: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PmLogTotals {
    pub total_logs: u64,
    pub functional_count: u64,
    pub not_functional_count: u64,
}

/// Per-device rollup for the statistics overview
#[derive(Debug, Clone, FromQueryResult, serde::Serialize)]
pub struct DeviceLogRollup {
    pub device_id: i32,
    pub device_name: String,
    pub log_count: i64,
    pub last_pm_date: String,
}

pub struct PmLogRepository {
    conn: DatabaseConnection,
}

impl PmLogRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, filters: &PmLogFilters) -> Result<Vec<PmLog>> {
        let mut query = pm_logs::Entity::find()
            .order_by_desc(pm_logs::Column::Date)
            .order_by_desc(pm_logs::Column::CreatedAt);

        if let Some(device_id) = filters.device_id {
            query = query.filter(pm_logs::Column::DeviceId.eq(device_id));
        }
        if let Some(status) = &filters.fully_functional {
            query = query.filter(pm_logs::Column::FullyFunctional.eq(status));
        }
        if let Some(start) = &filters.start_date {
            query = query.filter(pm_logs::Column::Date.gte(start));
        }
        if let Some(end) = &filters.end_date {
            query = query.filter(pm_logs::Column::Date.lte(end));
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list PM logs")?;

        Ok(rows)
    }

    pub async fn get(&self, id: i32) -> Result<Option<PmLog>> {
        let row = pm_logs::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query PM log")?;

        Ok(row)
    }

    /// Log plus tasks ordered by maintenance type then insertion order
    pub async fn get_with_tasks(&self, id: i32) -> Result<Option<(PmLog, Vec<PmLogTask>)>> {
        let Some(log) = self.get(id).await? else {
            return Ok(None);
        };

        let tasks = pm_log_tasks::Entity::find()
            .filter(pm_log_tasks::Column::PmLogId.eq(id))
            .order_by_asc(pm_log_tasks::Column::MaintenanceType)
            .order_by_asc(pm_log_tasks::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query PM log tasks")?;

        Ok(Some((log, tasks)))
    }

    /// Create the log and copy every task of the device's checklists into
    /// it, in one transaction. The copies start unchecked.
    pub async fn create_with_tasks(
        &self,
        device: &Device,
        new_log: NewPmLog,
    ) -> Result<(PmLog, Vec<PmLogTask>)> {
        let now = chrono::Utc::now().to_rfc3339();

        let txn = self.conn.begin().await?;

        let log = pm_logs::ActiveModel {
            device_id: Set(device.id),
            device_name: Set(device.device_name.clone()),
            serial_number: Set(device.serial_number.clone()),
            manufacturer: Set(device.manufacturer.clone()),
            date: Set(new_log.date),
            fully_functional: Set(new_log.fully_functional),
            recommendation: Set(new_log.recommendation),
            performed_by: Set(new_log.performed_by),
            validated_by: Set(new_log.validated_by),
            acknowledged_by: Set(new_log.acknowledged_by),
            findings_solutions: Set(new_log.findings_solutions),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let checklists = pm_checklists::Entity::find()
            .filter(pm_checklists::Column::DeviceId.eq(device.id))
            .order_by_asc(pm_checklists::Column::MaintenanceTypes)
            .all(&txn)
            .await?;

        for checklist in checklists {
            let tasks = pm_tasks::Entity::find()
                .filter(pm_tasks::Column::ChecklistId.eq(checklist.id))
                .order_by_asc(pm_tasks::Column::Id)
                .all(&txn)
                .await?;

            for task in tasks {
                pm_log_tasks::ActiveModel {
                    pm_log_id: Set(log.id),
                    task_description: Set(task.task_description),
                    maintenance_type: Set(checklist.maintenance_types.clone()),
                    is_checked: Set(false),
                    created_at: Set(now.clone()),
                    updated_at: Set(now.clone()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;

        let tasks = pm_log_tasks::Entity::find()
            .filter(pm_log_tasks::Column::PmLogId.eq(log.id))
            .order_by_asc(pm_log_tasks::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to re-read PM log tasks")?;

        Ok((log, tasks))
    }

    /// Latest logs for one device plus per-log task counts
    pub async fn device_history(
        &self,
        device_id: i32,
        limit: u64,
    ) -> Result<Vec<PmLogWithCounts>> {
        let logs = pm_logs::Entity::find()
            .filter(pm_logs::Column::DeviceId.eq(device_id))
            .order_by_desc(pm_logs::Column::Date)
            .order_by_desc(pm_logs::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query device PM history")?;

        if logs.is_empty() {
            return Ok(Vec::new());
        }

        let log_ids: Vec<i32> = logs.iter().map(|l| l.id).collect();
        let task_rows: Vec<(i32, bool)> = pm_log_tasks::Entity::find()
            .select_only()
            .column(pm_log_tasks::Column::PmLogId)
            .column(pm_log_tasks::Column::IsChecked)
            .filter(pm_log_tasks::Column::PmLogId.is_in(log_ids))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query task counts for device history")?;

        let mut counts: HashMap<i32, (u64, u64)> = HashMap::new();
        for (log_id, is_checked) in task_rows {
            let entry = counts.entry(log_id).or_default();
            entry.0 += 1;
            if is_checked {
                entry.1 += 1;
            }
        }

        Ok(logs
            .into_iter()
            .map(|log| {
                let (total_tasks, checked_tasks) = counts.get(&log.id).copied().unwrap_or((0, 0));
                PmLogWithCounts {
                    log,
                    total_tasks,
                    checked_tasks,
                }
            })
            .collect())
    }

    pub async fn update(&self, id: i32, update: PmLogUpdate) -> Result<Option<PmLog>> {
        let row = pm_logs::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query PM log for update")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut active: pm_logs::ActiveModel = row.into();
        if let Some(date) = update.date {
            active.date = Set(date);
        }
        if let Some(status) = update.fully_functional {
            active.fully_functional = Set(status);
        }
        if let Some(recommendation) = update.recommendation {
            active.recommendation = Set(Some(recommendation));
        }
        if let Some(performed_by) = update.performed_by {
            active.performed_by = Set(performed_by);
        }
        if let Some(validated_by) = update.validated_by {
            active.validated_by = Set(Some(validated_by));
        }
        if let Some(acknowledged_by) = update.acknowledged_by {
            active.acknowledged_by = Set(Some(acknowledged_by));
        }
        if let Some(findings) = update.findings_solutions {
            active.findings_solutions = Set(Some(findings));
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    /// Delete a log, returning the removed row; its tasks cascade
    pub async fn delete(&self, id: i32) -> Result<Option<PmLog>> {
        let row = pm_logs::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query PM log for delete")?;

        let Some(row) = row else {
            return Ok(None);
        };

        pm_logs::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete PM log")?;

        Ok(Some(row))
    }

    pub async fn get_task(&self, task_id: i32) -> Result<Option<PmLogTask>> {
        let task = pm_log_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query PM log task")?;

        Ok(task)
    }

    pub async fn set_task_checked(
        &self,
        task_id: i32,
        is_checked: bool,
    ) -> Result<Option<PmLogTask>> {
        let task = pm_log_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query PM log task for update")?;

        let Some(task) = task else {
            return Ok(None);
        };

        let mut active: pm_log_tasks::ActiveModel = task.into();
        active.is_checked = Set(is_checked);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    pub async fn add_task(
        &self,
        pm_log_id: i32,
        description: &str,
        maintenance_type: &str,
    ) -> Result<PmLogTask> {
        let now = chrono::Utc::now().to_rfc3339();

        let task = pm_log_tasks::ActiveModel {
            pm_log_id: Set(pm_log_id),
            task_description: Set(description.to_string()),
            maintenance_type: Set(maintenance_type.to_string()),
            is_checked: Set(false),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert PM log task")?;

        Ok(task)
    }

    /// Delete a single task, returning the removed row
    pub async fn delete_task(&self, task_id: i32) -> Result<Option<PmLogTask>> {
        let task = pm_log_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query PM log task for delete")?;

        let Some(task) = task else {
            return Ok(None);
        };

        pm_log_tasks::Entity::delete_by_id(task_id)
            .exec(&self.conn)
            .await
            .context("Failed to delete PM log task")?;

        Ok(Some(task))
    }

    /// Overall counts plus a per-device rollup, optionally date-bounded
    pub async fn statistics(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<(PmLogTotals, Vec<DeviceLogRollup>)> {
        let date_bounded = |mut query: sea_orm::Select<pm_logs::Entity>| {
            if let Some(start) = start_date {
                query = query.filter(pm_logs::Column::Date.gte(start));
            }
            if let Some(end) = end_date {
                query = query.filter(pm_logs::Column::Date.lte(end));
            }
            query
        };

        let total_logs = date_bounded(pm_logs::Entity::find())
            .count(&self.conn)
            .await?;
        let functional_count = date_bounded(
            pm_logs::Entity::find().filter(pm_logs::Column::FullyFunctional.eq("Yes")),
        )
        .count(&self.conn)
        .await?;
        let not_functional_count = date_bounded(
            pm_logs::Entity::find().filter(pm_logs::Column::FullyFunctional.eq("No")),
        )
        .count(&self.conn)
        .await?;

        let mut rollup = date_bounded(pm_logs::Entity::find())
            .select_only()
            .column(pm_logs::Column::DeviceId)
            .column(pm_logs::Column::DeviceName)
            .column_as(pm_logs::Column::Id.count(), "log_count")
            .column_as(pm_logs::Column::Date.max(), "last_pm_date")
            .group_by(pm_logs::Column::DeviceId)
            .group_by(pm_logs::Column::DeviceName)
            .into_model::<DeviceLogRollup>()
            .all(&self.conn)
            .await
            .context("Failed to query per-device log rollup")?;

        rollup.sort_by(|a, b| b.last_pm_date.cmp(&a.last_pm_date));

        Ok((
            PmLogTotals {
                total_logs,
                functional_count,
                not_functional_count,
            },
            rollup,
        ))
    }
}
