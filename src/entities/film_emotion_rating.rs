use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "film_emotion_rating")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub film_id: i32,
    pub emotion_id: i32,
    pub intensity: i32,
    pub description: String,
    pub rated_by: Option<i32>,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::film::Entity",
        from = "Column::FilmId",
        to = "super::film::Column::Id",
        on_delete = "Cascade"
    )]
    Film,
    #[sea_orm(
        belongs_to = "super::emotion::Entity",
        from = "Column::EmotionId",
        to = "super::emotion::Column::Id",
        on_delete = "Cascade"
    )]
    Emotion,
}

impl Related<super::film::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Film.def()
    }
}

impl Related<super::emotion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Emotion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
