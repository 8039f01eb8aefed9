use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Emotion::Table)
                    .if_not_exists()
                    .col(pk_auto(Emotion::Id))
                    .col(string_uniq(Emotion::Name))
                    .col(string_uniq(Emotion::Slug))
                    .col(text(Emotion::Description))
                    .col(string(Emotion::Color).default("#FF6B6B"))
                    .col(string(Emotion::Icon).default(""))
                    .col(boolean(Emotion::IsActive).default(true))
                    .col(big_integer(Emotion::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Film::Table)
                    .if_not_exists()
                    .col(pk_auto(Film::Id))
                    .col(string(Film::Title))
                    .col(string(Film::OriginalTitle).default(""))
                    .col(text(Film::Description))
                    .col(integer(Film::Year))
                    .col(integer(Film::Duration))
                    .col(string_null(Film::Poster))
                    .col(string(Film::TrailerUrl).default(""))
                    .col(string(Film::Country))
                    .col(string(Film::Director))
                    .col(string(Film::Genre))
                    .col(double(Film::Rating).default(0.0))
                    .col(integer(Film::ViewsCount).default(0))
                    .col(boolean(Film::IsPublished).default(true))
                    .col(integer_null(Film::CreatedBy))
                    .col(big_integer(Film::CreatedAt))
                    .col(big_integer(Film::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        for (name, col) in [
            ("idx_film_year", Film::Year),
            ("idx_film_rating", Film::Rating),
            ("idx_film_genre", Film::Genre),
        ] {
            manager
                .create_index(
                    Index::create().name(name).table(Film::Table).col(col).to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(FilmEmotionRating::Table)
                    .if_not_exists()
                    .col(pk_auto(FilmEmotionRating::Id))
                    .col(integer(FilmEmotionRating::FilmId))
                    .col(integer(FilmEmotionRating::EmotionId))
                    .col(integer(FilmEmotionRating::Intensity))
                    .col(text(FilmEmotionRating::Description).default(""))
                    .col(integer_null(FilmEmotionRating::RatedBy))
                    .col(big_integer(FilmEmotionRating::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_film")
                            .from(FilmEmotionRating::Table, FilmEmotionRating::FilmId)
                            .to(Film::Table, Film::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_emotion")
                            .from(FilmEmotionRating::Table, FilmEmotionRating::EmotionId)
                            .to(Emotion::Table, Emotion::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rating_film_emotion_unique")
                    .table(FilmEmotionRating::Table)
                    .col(FilmEmotionRating::FilmId)
                    .col(FilmEmotionRating::EmotionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rating_emotion_intensity")
                    .table(FilmEmotionRating::Table)
                    .col(FilmEmotionRating::EmotionId)
                    .col(FilmEmotionRating::Intensity)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(FilmEmotionRating::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Film::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Emotion::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Emotion {
    Table,
    Id,
    Name,
    Slug,
    Description,
    Color,
    Icon,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Film {
    Table,
    Id,
    Title,
    OriginalTitle,
    Description,
    Year,
    Duration,
    Poster,
    TrailerUrl,
    Country,
    Director,
    Genre,
    Rating,
    ViewsCount,
    IsPublished,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FilmEmotionRating {
    Table,
    Id,
    FilmId,
    EmotionId,
    Intensity,
    Description,
    RatedBy,
    CreatedAt,
}
