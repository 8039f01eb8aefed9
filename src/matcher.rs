use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::debug;

use crate::{
    entities::{emotion, film_emotion_rating, subscription},
    error::AppResult,
};

/// A subscription that qualifies for a film through one of its ratings.
#[derive(Clone, Debug)]
pub struct SubscriptionMatch {
    pub subscription: subscription::Model,
    pub emotion: emotion::Model,
    pub intensity: i32,
}

/// Every active subscription whose emotion is rated on the film at or above
/// the subscription's threshold. One entry per (subscription, rating) pair.
pub async fn matching_subscriptions<C: ConnectionTrait>(
    conn: &C,
    film_id: i32,
) -> AppResult<Vec<SubscriptionMatch>> {
    let ratings = film_emotion_rating::Entity::find()
        .filter(film_emotion_rating::Column::FilmId.eq(film_id))
        .order_by_asc(film_emotion_rating::Column::Id)
        .find_also_related(emotion::Entity)
        .all(conn)
        .await?;

    if ratings.is_empty() {
        debug!(film_id, "film has no emotion ratings, nothing to match");
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    for (rating, emotion) in ratings {
        let Some(emotion) = emotion else { continue };

        let subscriptions = subscription::Entity::find()
            .filter(subscription::Column::EmotionId.eq(rating.emotion_id))
            .filter(subscription::Column::IsActive.eq(true))
            .filter(subscription::Column::MinIntensity.lte(rating.intensity))
            .order_by_asc(subscription::Column::Id)
            .all(conn)
            .await?;

        debug!(
            film_id,
            emotion = %emotion.name,
            intensity = rating.intensity,
            matched = subscriptions.len(),
            "matched subscriptions for rating"
        );

        matches.extend(subscriptions.into_iter().map(|subscription| SubscriptionMatch {
            subscription,
            emotion: emotion.clone(),
            intensity: rating.intensity,
        }));
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ratings::set_rating, test_support};

    #[tokio::test]
    async fn film_without_ratings_matches_nothing() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let user = test_support::user(&db, "ann").await;
        test_support::subscription(&db, user.id, joy.id, 1, true).await;
        let film = test_support::film(&db, "Blank", false).await;

        assert!(matching_subscriptions(&db, film.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let ann = test_support::user(&db, "ann").await;
        test_support::subscription(&db, ann.id, joy.id, 5, true).await;

        let exact = test_support::film(&db, "Exact", false).await;
        set_rating(&db, exact.id, &test_support::rating(joy.id, 5), None).await.unwrap();
        let below = test_support::film(&db, "Below", false).await;
        set_rating(&db, below.id, &test_support::rating(joy.id, 4), None).await.unwrap();

        assert_eq!(matching_subscriptions(&db, exact.id).await.unwrap().len(), 1);
        assert!(matching_subscriptions(&db, below.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inactive_and_other_emotion_subscriptions_are_skipped() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let fear = test_support::emotion(&db, "Fear").await;
        let ann = test_support::user(&db, "ann").await;
        let bob = test_support::user(&db, "bob").await;
        test_support::subscription(&db, ann.id, joy.id, 3, false).await;
        test_support::subscription(&db, bob.id, fear.id, 3, true).await;

        let film = test_support::film(&db, "Up", false).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 9), None).await.unwrap();

        assert!(matching_subscriptions(&db, film.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_user_can_match_several_emotions() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let fear = test_support::emotion(&db, "Fear").await;
        let ann = test_support::user(&db, "ann").await;
        test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        test_support::subscription(&db, ann.id, fear.id, 5, true).await;

        let film = test_support::film(&db, "Jaws", false).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 6), None).await.unwrap();
        set_rating(&db, film.id, &test_support::rating(fear.id, 9), None).await.unwrap();

        let matches = matching_subscriptions(&db, film.id).await.unwrap();
        let mut found: Vec<(String, i32)> =
            matches.iter().map(|m| (m.emotion.name.clone(), m.intensity)).collect();
        found.sort();
        assert_eq!(found, vec![("Fear".to_string(), 9), ("Joy".to_string(), 6)]);
        assert!(matches.iter().all(|m| m.subscription.user_id == ann.id));
    }
}
