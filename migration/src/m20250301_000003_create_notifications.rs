use sea_orm_migration::{prelude::*, schema::*};

use crate::{
    m20250301_000001_create_catalog::{Emotion, Film},
    m20250301_000002_create_accounts::User,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(pk_auto(Subscription::Id))
                    .col(integer(Subscription::UserId))
                    .col(integer(Subscription::EmotionId))
                    .col(integer(Subscription::MinIntensity).default(5))
                    .col(boolean(Subscription::IsActive).default(true))
                    .col(big_integer(Subscription::CreatedAt))
                    .col(big_integer_null(Subscription::LastNotified))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_user")
                            .from(Subscription::Table, Subscription::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_emotion")
                            .from(Subscription::Table, Subscription::EmotionId)
                            .to(Emotion::Table, Emotion::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_user_emotion_unique")
                    .table(Subscription::Table)
                    .col(Subscription::UserId)
                    .col(Subscription::EmotionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_emotion_active")
                    .table(Subscription::Table)
                    .col(Subscription::EmotionId)
                    .col(Subscription::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(pk_auto(Notification::Id))
                    .col(integer(Notification::UserId))
                    .col(integer_null(Notification::SubscriptionId))
                    .col(integer_null(Notification::FilmId))
                    .col(integer_null(Notification::EmotionId))
                    .col(string(Notification::NotificationType).default("new_film"))
                    .col(string(Notification::Title))
                    .col(text(Notification::Message))
                    .col(boolean(Notification::IsRead).default(false))
                    .col(boolean(Notification::SentViaEmail).default(false))
                    .col(boolean(Notification::SentViaTelegram).default(false))
                    .col(big_integer(Notification::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notification::Table, Notification::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_subscription")
                            .from(Notification::Table, Notification::SubscriptionId)
                            .to(Subscription::Table, Subscription::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_film")
                            .from(Notification::Table, Notification::FilmId)
                            .to(Film::Table, Film::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_emotion")
                            .from(Notification::Table, Notification::EmotionId)
                            .to(Emotion::Table, Emotion::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_read_created")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::IsRead)
                    .col(Notification::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_dedup")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::FilmId)
                    .col(Notification::EmotionId)
                    .col(Notification::NotificationType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Notification::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Subscription::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Subscription {
    Table,
    Id,
    UserId,
    EmotionId,
    MinIntensity,
    IsActive,
    CreatedAt,
    LastNotified,
}

#[derive(DeriveIden)]
enum Notification {
    Table,
    Id,
    UserId,
    SubscriptionId,
    FilmId,
    EmotionId,
    NotificationType,
    Title,
    Message,
    IsRead,
    SentViaEmail,
    SentViaTelegram,
    CreatedAt,
}
