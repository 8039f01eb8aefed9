use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub subscription_id: Option<i32>,
    pub film_id: Option<i32>,
    pub emotion_id: Option<i32>,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub sent_via_email: bool,
    pub sent_via_telegram: bool,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
