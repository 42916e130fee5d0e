use sea_orm::entity::prelude::*;

/// Record of one completed maintenance visit. Device fields are
/// snapshotted so history survives device edits and renames.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pm_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub device_id: i32,

    pub device_name: String,

    pub serial_number: String,

    pub manufacturer: String,

    /// Date of the maintenance visit (not the row creation time).
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
    #[sea_orm(has_many = "super::pm_log_tasks::Entity")]
    PmLogTasks,
}

impl Related<super::devices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Devices.def()
    }
}

impl Related<super::pm_log_tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmLogTasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
