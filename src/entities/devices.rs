use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub device_name: String,

    #[sea_orm(unique)]
    pub serial_number: String,

    pub manufacturer: String,

    /// Externally visible inventory label, distinct from the row id.
    #[sea_orm(unique)]
    pub asset_tag: String,

    pub date_purchased: String,

    pub responsible_person: String,

    pub location: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pm_checklists::Entity")]
    PmChecklists,
    #[sea_orm(has_many = "super::pm_logs::Entity")]
    PmLogs,
    #[sea_orm(has_many = "super::qr_tokens::Entity")]
    QrTokens,
}

impl Related<super::pm_checklists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmChecklists.def()
    }
}

impl Related<super::pm_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmLogs.def()
    }
}

impl Related<super::qr_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QrTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
