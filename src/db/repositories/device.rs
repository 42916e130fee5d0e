use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::devices;

pub use crate::entities::devices::Model as Device;

/// Fields for creating or replacing a device record
#[derive(Debug, Clone)]
pub struct DeviceInput {
    pub device_name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub asset_tag: String,
    pub date_purchased: String,
    pub responsible_person: String,
    pub location: String,
}

/// Which unique column an insert/update collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceConflict {
    SerialNumber,
    AssetTag,
}

pub struct DeviceRepository {
    conn: DatabaseConnection,
}

impl DeviceRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_all(&self) -> Result<Vec<Device>> {
        let rows = devices::Entity::find()
            .order_by_desc(devices::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list devices")?;

        Ok(rows)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Device>> {
        let row = devices::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query device")?;

        Ok(row)
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        let count = devices::Entity::find()
            .filter(devices::Column::Id.eq(id))
            .count(&self.conn)
            .await
            .context("Failed to check device existence")?;

        Ok(count > 0)
    }

    /// Detect which unique column a prospective insert would collide with.
    /// `exclude_id` skips the device being updated.
    pub async fn find_conflict(
        &self,
        serial_number: &str,
        asset_tag: &str,
        exclude_id: Option<i32>,
    ) -> Result<Option<DeviceConflict>> {
        let mut serial_query =
            devices::Entity::find().filter(devices::Column::SerialNumber.eq(serial_number));
        let mut tag_query = devices::Entity::find().filter(devices::Column::AssetTag.eq(asset_tag));

        if let Some(id) = exclude_id {
            serial_query = serial_query.filter(devices::Column::Id.ne(id));
            tag_query = tag_query.filter(devices::Column::Id.ne(id));
        }

        if serial_query.count(&self.conn).await? > 0 {
            return Ok(Some(DeviceConflict::SerialNumber));
        }
        if tag_query.count(&self.conn).await? > 0 {
            return Ok(Some(DeviceConflict::AssetTag));
        }

        Ok(None)
    }

    pub async fn create(&self, input: DeviceInput) -> Result<Device> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = devices::ActiveModel {
            device_name: Set(input.device_name),
            serial_number: Set(input.serial_number),
            manufacturer: Set(input.manufacturer),
            asset_tag: Set(input.asset_tag),
            date_purchased: Set(input.date_purchased),
            responsible_person: Set(input.responsible_person),
            location: Set(input.location),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert device")?;

        Ok(model)
    }

    /// Full-row replace of the editable columns
    pub async fn update(&self, id: i32, input: DeviceInput) -> Result<Option<Device>> {
        let row = devices::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query device for update")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut active: devices::ActiveModel = row.into();
        active.device_name = Set(input.device_name);
        active.serial_number = Set(input.serial_number);
        active.manufacturer = Set(input.manufacturer);
        active.asset_tag = Set(input.asset_tag);
        active.date_purchased = Set(input.date_purchased);
        active.responsible_person = Set(input.responsible_person);
        active.location = Set(input.location);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(Some(updated))
    }

    /// Delete a device; checklists, logs and QR tokens cascade with it
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = devices::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete device")?;

        Ok(result.rows_affected > 0)
    }

    /// Substring search across the identifying columns
    pub async fn search(&self, term: &str) -> Result<Vec<Device>> {
        let rows = devices::Entity::find()
            .filter(
                Condition::any()
                    .add(devices::Column::DeviceName.contains(term))
                    .add(devices::Column::SerialNumber.contains(term))
                    .add(devices::Column::Manufacturer.contains(term))
                    .add(devices::Column::AssetTag.contains(term))
                    .add(devices::Column::ResponsiblePerson.contains(term))
                    .add(devices::Column::Location.contains(term)),
            )
            .order_by_asc(devices::Column::DeviceName)
            .all(&self.conn)
            .await
            .context("Failed to search devices")?;

        Ok(rows)
    }
}
