use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub last_name: String,

    pub first_name: String,

    pub middle_name: String,

    pub position: String,

    /// "admin" or "user"
    pub role: String,

    pub profile_picture: Option<String>,

    /// Forces password rotation on first login/bootstrap.
    pub must_change_password: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::password_history::Entity")]
    PasswordHistory,
    #[sea_orm(has_many = "super::refresh_tokens::Entity")]
    RefreshTokens,
    #[sea_orm(has_many = "super::qr_tokens::Entity")]
    QrTokens,
}

impl Related<super::password_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordHistory.def()
    }
}

impl Related<super::refresh_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefreshTokens.def()
    }
}

impl Related<super::qr_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QrTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
