use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::entities::{pm_checklists, pm_tasks};

use super::device::Device;

pub use crate::entities::pm_checklists::Model as Checklist;
pub use crate::entities::pm_tasks::Model as ChecklistTask;

pub struct ChecklistRepository {
    conn: DatabaseConnection,
}

impl ChecklistRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_all(&self) -> Result<Vec<Checklist>> {
        let rows = pm_checklists::Entity::find()
            .order_by_desc(pm_checklists::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list checklists")?;

        Ok(rows)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Checklist>> {
        let row = pm_checklists::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query checklist")?;

        Ok(row)
    }

    pub async fn get_with_tasks(&self, id: i32) -> Result<Option<(Checklist, Vec<ChecklistTask>)>> {
        let Some(checklist) = self.get(id).await? else {
            return Ok(None);
        };

        let tasks = pm_tasks::Entity::find()
            .filter(pm_tasks::Column::ChecklistId.eq(id))
            .order_by_asc(pm_tasks::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query checklist tasks")?;

        Ok(Some((checklist, tasks)))
    }

    /// Create one checklist carrying the device snapshot plus all of its
    /// tasks, atomically.
    pub async fn create_with_tasks(
        &self,
        device: &Device,
        maintenance_types: &[String],
        task_frequency: &str,
        task_descriptions: &[String],
    ) -> Result<(Checklist, Vec<ChecklistTask>)> {
        let maintenance_types_json = serde_json::to_string(maintenance_types)
            .context("Failed to serialize maintenance types")?;
        let now = chrono::Utc::now().to_rfc3339();

        let txn = self.conn.begin().await?;

        let checklist = pm_checklists::ActiveModel {
            device_id: Set(device.id),
            device_name: Set(device.device_name.clone()),
            serial_number: Set(device.serial_number.clone()),
            manufacturer: Set(device.manufacturer.clone()),
            asset_tag: Set(device.asset_tag.clone()),
            date_purchased: Set(device.date_purchased.clone()),
            responsible_person: Set(device.responsible_person.clone()),
            location: Set(device.location.clone()),
            maintenance_types: Set(maintenance_types_json),
            task_frequency: Set(task_frequency.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for description in task_descriptions {
            pm_tasks::ActiveModel {
                checklist_id: Set(checklist.id),
                task_description: Set(description.clone()),
                is_completed: Set(false),
                completed_by: Set(None),
                completed_at: Set(None),
                notes: Set(None),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        let tasks = pm_tasks::Entity::find()
            .filter(pm_tasks::Column::ChecklistId.eq(checklist.id))
            .order_by_asc(pm_tasks::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to re-read checklist tasks")?;

        Ok((checklist, tasks))
    }

    /// Partial update; `None` keeps the stored value
    pub async fn update(
        &self,
        id: i32,
        maintenance_types: Option<&[String]>,
        task_frequency: Option<&str>,
    ) -> Result<Option<Checklist>> {
        let row = pm_checklists::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query checklist for update")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut active: pm_checklists::ActiveModel = row.into();
        if let Some(types) = maintenance_types {
            let json =
                serde_json::to_string(types).context("Failed to serialize maintenance types")?;
            active.maintenance_types = Set(json);
        }
        if let Some(frequency) = task_frequency {
            active.task_frequency = Set(frequency.to_string());
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    /// Delete a checklist; its tasks cascade with it
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = pm_checklists::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete checklist")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn add_task(&self, checklist_id: i32, description: &str) -> Result<ChecklistTask> {
        let now = chrono::Utc::now().to_rfc3339();

        let task = pm_tasks::ActiveModel {
            checklist_id: Set(checklist_id),
            task_description: Set(description.to_string()),
            is_completed: Set(false),
            completed_by: Set(None),
            completed_at: Set(None),
            notes: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert checklist task")?;

        Ok(task)
    }

    pub async fn get_task(&self, task_id: i32) -> Result<Option<ChecklistTask>> {
        let task = pm_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query checklist task")?;

        Ok(task)
    }

    /// Toggle completion. Completing stamps who and when; un-completing
    /// clears both.
    pub async fn set_task_completion(
        &self,
        task_id: i32,
        is_completed: bool,
        notes: Option<String>,
        completed_by: &str,
    ) -> Result<Option<ChecklistTask>> {
        let task = pm_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query checklist task for update")?;

        let Some(task) = task else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: pm_tasks::ActiveModel = task.into();
        active.is_completed = Set(is_completed);
        active.notes = Set(notes);
        if is_completed {
            active.completed_by = Set(Some(completed_by.to_string()));
            active.completed_at = Set(Some(now.clone()));
        } else {
            active.completed_by = Set(None);
            active.completed_at = Set(None);
        }
        active.updated_at = Set(now);

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    pub async fn update_task_description(
        &self,
        task_id: i32,
        description: &str,
    ) -> Result<Option<ChecklistTask>> {
        let task = pm_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query checklist task for update")?;

        let Some(task) = task else {
            return Ok(None);
        };

        let mut active: pm_tasks::ActiveModel = task.into();
        active.task_description = Set(description.to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    /// Delete a single task, returning the removed row
    pub async fn delete_task(&self, task_id: i32) -> Result<Option<ChecklistTask>> {
        let task = pm_tasks::Entity::find_by_id(task_id)
            .one(&self.conn)
            .await
            .context("Failed to query checklist task for delete")?;

        let Some(task) = task else {
            return Ok(None);
        };

        pm_tasks::Entity::delete_by_id(task_id)
            .exec(&self.conn)
            .await
            .context("Failed to delete checklist task")?;

        Ok(Some(task))
    }
}
