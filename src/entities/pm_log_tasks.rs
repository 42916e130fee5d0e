use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pm_log_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub pm_log_id: i32,

    pub task_description: String,

    /// Group label copied from the source checklist.
    pub maintenance_type: String,

    pub is_checked: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pm_logs::Entity",
        from = "Column::PmLogId",
        to = "super::pm_logs::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    PmLogs,
}

impl Related<super::pm_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
