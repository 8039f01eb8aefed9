use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "film")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub original_title: String,
    pub description: String,
    pub year: i32,
    pub duration: i32,
    pub poster: Option<String>,
    pub trailer_url: String,
    pub country: String,
    pub director: String,
    pub genre: String,
    #[sea_orm(column_type = "Double")]
    pub rating: f64,
    pub views_count: i32,
    pub is_published: bool,
    pub created_by: Option<i32>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::film_emotion_rating::Entity")]
    FilmEmotionRating,
}

impl Related<super::film_emotion_rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FilmEmotionRating.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
