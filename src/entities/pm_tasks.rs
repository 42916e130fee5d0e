use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pm_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pm_checklists::Entity",
        from = "Column::ChecklistId",
        to = "super::pm_checklists::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    PmChecklists,
}

impl Related<super::pm_checklists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmChecklists.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
