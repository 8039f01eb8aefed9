use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_catalog::{Emotion, Film};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(pk_auto(User::Id))
                    .col(string_uniq(User::Username))
                    .col(string_uniq(User::Email))
                    .col(string(User::PasswordHash))
                    .col(boolean(User::IsStaff).default(false))
                    .col(big_integer(User::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserProfile::Table)
                    .if_not_exists()
                    .col(integer(UserProfile::UserId).primary_key())
                    .col(string_null(UserProfile::FirstName))
                    .col(string_null(UserProfile::LastName))
                    .col(string_null(UserProfile::Avatar))
                    .col(text(UserProfile::Bio).default(""))
                    .col(string(UserProfile::NotificationFrequency).default("daily"))
                    .col(boolean(UserProfile::EmailNotifications).default(true))
                    .col(string(UserProfile::TelegramId).default(""))
                    .col(big_integer(UserProfile::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_user")
                            .from(UserProfile::Table, UserProfile::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Session::Table)
                    .if_not_exists()
                    .col(string(Session::Token).primary_key())
                    .col(integer(Session::UserId))
                    .col(big_integer(Session::CreatedAt))
                    .col(big_integer(Session::ExpiresAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_user")
                            .from(Session::Table, Session::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FavoriteFilm::Table)
                    .if_not_exists()
                    .col(integer(FavoriteFilm::UserId))
                    .col(integer(FavoriteFilm::FilmId))
                    .col(big_integer(FavoriteFilm::CreatedAt))
                    .primary_key(
                        Index::create().col(FavoriteFilm::UserId).col(FavoriteFilm::FilmId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorite_user")
                            .from(FavoriteFilm::Table, FavoriteFilm::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorite_film")
                            .from(FavoriteFilm::Table, FavoriteFilm::FilmId)
                            .to(Film::Table, Film::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PreferredEmotion::Table)
                    .if_not_exists()
                    .col(integer(PreferredEmotion::UserId))
                    .col(integer(PreferredEmotion::EmotionId))
                    .primary_key(
                        Index::create()
                            .col(PreferredEmotion::UserId)
                            .col(PreferredEmotion::EmotionId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preferred_user")
                            .from(PreferredEmotion::Table, PreferredEmotion::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preferred_emotion")
                            .from(PreferredEmotion::Table, PreferredEmotion::EmotionId)
                            .to(Emotion::Table, Emotion::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(PreferredEmotion::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(FavoriteFilm::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Session::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(UserProfile::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum User {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    IsStaff,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserProfile {
    Table,
    UserId,
    FirstName,
    LastName,
    Avatar,
    Bio,
    NotificationFrequency,
    EmailNotifications,
    TelegramId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Session {
    Table,
    Token,
    UserId,
    CreatedAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum FavoriteFilm {
    Table,
    UserId,
    FilmId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PreferredEmotion {
    Table,
    UserId,
    EmotionId,
}
