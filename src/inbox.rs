use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use tracing::{debug, info};
use validator::Validate;

use crate::{
    db::{now_sec, paginate},
    entities::{emotion, notification, subscription},
    error::{AppError, AppResult},
    models::{NotificationOut, Page, SubscriptionInput, SubscriptionOut},
};

pub const NOTIFICATIONS_PAGE_SIZE: u64 = 20;

/// A user's subscriptions and the notifications delivered to them. Every
/// operation is scoped to the owning user; other users' rows are reported
/// as not found.
#[derive(Clone)]
pub struct Inbox {
    db: DatabaseConnection,
}

impl Inbox {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn subscriptions(&self, user_id: i32) -> AppResult<Vec<SubscriptionOut>> {
        Ok(subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .order_by_desc(subscription::Column::CreatedAt)
            .order_by_desc(subscription::Column::Id)
            .find_also_related(emotion::Entity)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(s, e)| e.map(|e| SubscriptionOut::new(s, e)))
            .collect())
    }

    /// Subscribes to an active emotion. A second subscription to the same
    /// emotion is a conflict.
    pub async fn subscribe(&self, user_id: i32, input: SubscriptionInput) -> AppResult<SubscriptionOut> {
        input.validate()?;
        let emotion = emotion::Entity::find_by_id(input.emotion_id)
            .filter(emotion::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::validation(format!("emotion {} is not available", input.emotion_id)))?;

        let created = subscription::ActiveModel {
            user_id: Set(user_id),
            emotion_id: Set(emotion.id),
            min_intensity: Set(input.min_intensity),
            is_active: Set(true),
            created_at: Set(now_sec()),
            last_notified: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(user_id, emotion = %emotion.name, min_intensity = created.min_intensity, "subscribed");
        Ok(SubscriptionOut::new(created, emotion))
    }

    pub async fn unsubscribe(&self, user_id: i32, id: i32) -> AppResult<()> {
        let owned = self.owned_subscription(user_id, id).await?;
        subscription::Entity::delete_by_id(owned.id).exec(&self.db).await?;
        debug!(user_id, subscription_id = id, "subscription deleted");
        Ok(())
    }

    pub async fn toggle_subscription(&self, user_id: i32, id: i32) -> AppResult<SubscriptionOut> {
        let owned = self.owned_subscription(user_id, id).await?;
        let is_active = !owned.is_active;

        let mut model: subscription::ActiveModel = owned.into();
        model.is_active = Set(is_active);
        let updated = model.update(&self.db).await?;

        let emotion = emotion::Entity::find_by_id(updated.emotion_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("emotion {}", updated.emotion_id)))?;
        Ok(SubscriptionOut::new(updated, emotion))
    }

    pub async fn notifications(&self, user_id: i32, page: Option<u64>) -> AppResult<Page<NotificationOut>> {
        let select = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id);
        Ok(paginate(&self.db, select, page, NOTIFICATIONS_PAGE_SIZE).await?.map(NotificationOut::from))
    }

    pub async fn mark_read(&self, user_id: i32, id: i32) -> AppResult<NotificationOut> {
        let found = notification::Entity::find_by_id(id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("notification {id}")))?;
        if found.is_read {
            return Ok(found.into());
        }

        let mut model: notification::ActiveModel = found.into();
        model.is_read = Set(true);
        Ok(model.update(&self.db).await?.into())
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        let res = notification::Entity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;
        debug!(user_id, updated = res.rows_affected, "notifications marked read");
        Ok(res.rows_affected)
    }

    async fn owned_subscription(&self, user_id: i32, id: i32) -> AppResult<subscription::Model> {
        subscription::Entity::find_by_id(id)
            .filter(subscription::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("subscription {id}")))
    }
}
