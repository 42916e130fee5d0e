use sea_orm::entity::prelude::*;

/// Checklist template for a device. Device fields are snapshotted at
/// creation so the checklist stays readable if the device record changes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pm_checklists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub device_id: i32,

    pub device_name: String,

    pub serial_number: String,

    pub manufacturer: String,

    pub asset_tag: String,

    pub date_purchased: String,

    pub responsible_person: String,

    pub location: String,

    /// JSON array of maintenance category labels.
    pub maintenance_types: String,

    pub task_frequency: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::devices::Entity",
        from = "Column::DeviceId",
        to = "super::devices::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Devices,
    #[sea_orm(has_many = "super::pm_tasks::Entity")]
    PmTasks,
}

impl Related<super::devices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Devices.def()
    }
}

impl Related<super::pm_tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmTasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
