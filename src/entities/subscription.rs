use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub emotion_id: i32,
    pub min_intensity: i32,
    pub is_active: bool,
    pub created_at: i64,
    pub last_notified: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::emotion::Entity",
        from = "Column::EmotionId",
        to = "super::emotion::Column::Id",
        on_delete = "Cascade"
    )]
    Emotion,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::emotion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Emotion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
