use std::{future::Future, sync::Arc};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use tracing::{debug, info, warn};

use crate::{
    db::now_sec,
    entities::{film, notification, subscription, user, user_profile},
    error::{AppError, AppResult},
    mailer::{Mailer, OutgoingMail},
    matcher::{self, SubscriptionMatch},
    models::{NotificationType, genre_label},
};

const EMAIL_DESCRIPTION_CHARS: usize = 200;

/// Sender and link settings the dispatcher embeds in outgoing mail.
#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub from_email: String,
    pub site_host: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchReport {
    pub matched: usize,
    pub created: usize,
    pub duplicates: usize,
    pub emailed: usize,
    pub failed: usize,
}

enum Outcome {
    Duplicate,
    Created { emailed: bool },
}

#[derive(Clone)]
pub struct Dispatcher {
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    settings: Arc<DispatchSettings>,
}

impl Dispatcher {
    pub fn new(db: DatabaseConnection, mailer: Arc<dyn Mailer>, settings: DispatchSettings) -> Self {
        Self { db, mailer, settings: Arc::new(settings) }
    }

    /// The side effect queued on a film write that published the film.
    pub fn after_publish(&self, film_id: i32) -> impl Future<Output = ()> + Send + 'static {
        let dispatcher = self.clone();
        async move {
            match dispatcher.notify_subscribers(film_id).await {
                Ok(report) => info!(
                    film_id,
                    matched = report.matched,
                    created = report.created,
                    duplicates = report.duplicates,
                    emailed = report.emailed,
                    failed = report.failed,
                    "subscribers notified"
                ),
                Err(err) => warn!(film_id, error = %err, "notifying subscribers failed"),
            }
        }
    }

    /// Creates one notification per qualifying (subscription, rating) pair
    /// and emails the users who opted in. A failure on one pair is logged and
    /// counted; the remaining pairs are still processed.
    pub async fn notify_subscribers(&self, film_id: i32) -> AppResult<DispatchReport> {
        let film = film::Entity::find_by_id(film_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("film {film_id}")))?;

        let mut report = DispatchReport::default();
        if !film.is_published {
            debug!(film_id, "film is not published, skipping notifications");
            return Ok(report);
        }

        let matches = matcher::matching_subscriptions(&self.db, film_id).await?;
        report.matched = matches.len();

        for m in &matches {
            match self.dispatch_one(&film, m).await {
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Ok(Outcome::Created { emailed }) => {
                    report.created += 1;
                    if emailed {
                        report.emailed += 1;
                    }
                },
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        film_id,
                        subscription_id = m.subscription.id,
                        error = %err,
                        "failed to notify subscription"
                    );
                },
            }
        }

        Ok(report)
    }

    async fn dispatch_one(&self, film: &film::Model, m: &SubscriptionMatch) -> AppResult<Outcome> {
        let user_id = m.subscription.user_id;

        let already_sent = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::FilmId.eq(film.id))
            .filter(notification::Column::EmotionId.eq(m.emotion.id))
            .filter(notification::Column::NotificationType.eq(NotificationType::Subscription.as_code()))
            .count(&self.db)
            .await?
            > 0;
        if already_sent {
            debug!(user_id, film_id = film.id, emotion = %m.emotion.name, "notification already exists");
            return Ok(Outcome::Duplicate);
        }

        let (title, message) = compose_notification(film, m);
        let created = notification::ActiveModel {
            user_id: Set(user_id),
            subscription_id: Set(Some(m.subscription.id)),
            film_id: Set(Some(film.id)),
            emotion_id: Set(Some(m.emotion.id)),
            notification_type: Set(NotificationType::Subscription.as_code().to_string()),
            title: Set(title),
            message: Set(message),
            is_read: Set(false),
            sent_via_email: Set(false),
            sent_via_telegram: Set(false),
            created_at: Set(now_sec()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        let emailed = self.deliver_email(film, m, &created).await?;

        subscription::ActiveModel {
            id: Set(m.subscription.id),
            last_notified: Set(Some(created.created_at)),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(Outcome::Created { emailed })
    }

    /// Sends the email copy when the user wants one. Transport failures are
    /// logged and reported as "not emailed".
    async fn deliver_email(
        &self,
        film: &film::Model,
        m: &SubscriptionMatch,
        created: &notification::Model,
    ) -> AppResult<bool> {
        let Some(user) = user::Entity::find_by_id(created.user_id).one(&self.db).await? else {
            return Ok(false);
        };
        let wants_email = user_profile::Entity::find_by_id(user.id)
            .one(&self.db)
            .await?
            .map(|p| p.email_notifications)
            .unwrap_or(true);
        if !wants_email || user.email.trim().is_empty() {
            return Ok(false);
        }

        let mail = compose_email(&self.settings, &user, film, m);
        if let Err(err) = self.mailer.send(&mail).await {
            warn!(username = %user.username, error = %err, "email delivery failed");
            return Ok(false);
        }

        notification::ActiveModel {
            id: Set(created.id),
            sent_via_email: Set(true),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(true)
    }
}

pub fn compose_notification(film: &film::Model, m: &SubscriptionMatch) -> (String, String) {
    let title = format!("New film: \"{}\"", film.title);
    let message = format!(
        "A new film matches your subscription to \"{emotion}\": \"{title}\" ({year}), \
         directed by {director}, {genre}, with intensity {intensity}/10.",
        emotion = m.emotion.name,
        title = film.title,
        year = film.year,
        director = film.director,
        genre = genre_label(&film.genre),
        intensity = m.intensity,
    );
    (title, message)
}

pub fn compose_email(
    settings: &DispatchSettings,
    user: &user::Model,
    film: &film::Model,
    m: &SubscriptionMatch,
) -> OutgoingMail {
    let description: String = film.description.chars().take(EMAIL_DESCRIPTION_CHARS).collect();
    let body = format!(
        "Hello, {username}!\n\n\
         A new film matches your subscription to \"{emotion}\":\n\n\
         \"{title}\" ({year})\n\
         Director: {director}\n\
         Genre: {genre}\n\
         Intensity of \"{emotion}\": {intensity}/10\n\n\
         Description: {description}...\n\n\
         View the film: http://{host}/films/{id}/\n",
        username = user.username,
        emotion = m.emotion.name,
        title = film.title,
        year = film.year,
        director = film.director,
        genre = genre_label(&film.genre),
        intensity = m.intensity,
        host = settings.site_host,
        id = film.id,
    );

    OutgoingMail {
        subject: format!("New film for your subscription: \"{}\"", film.title),
        body,
        from: settings.from_email.clone(),
        to: user.email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ratings::set_rating,
        test_support::{self, FailingMailer, RecordingMailer},
    };

    fn settings() -> DispatchSettings {
        DispatchSettings {
            from_email: "noreply@moviemood.test".into(),
            site_host: "moviemood.test".into(),
        }
    }

    async fn notifications(db: &DatabaseConnection) -> Vec<notification::Model> {
        notification::Entity::find().all(db).await.unwrap()
    }

    #[tokio::test]
    async fn creates_notification_and_email_for_each_match() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let ann = test_support::user(&db, "ann").await;
        let sub = test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        let film = test_support::film(&db, "Amelie", true).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 8), None).await.unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Dispatcher::new(db.clone(), mailer.clone(), settings());
        let report = dispatcher.notify_subscribers(film.id).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.emailed, 1);

        let stored = notifications(&db).await;
        assert_eq!(stored.len(), 1);
        let n = &stored[0];
        assert_eq!(n.user_id, ann.id);
        assert_eq!(n.subscription_id, Some(sub.id));
        assert_eq!(n.emotion_id, Some(joy.id));
        assert_eq!(n.notification_type, "subscription");
        assert!(n.sent_via_email);
        assert!(!n.sent_via_telegram);
        assert!(n.message.contains("Joy"));
        assert!(n.message.contains("8/10"));
        assert!(n.message.contains("Drama"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, ann.email);
        assert_eq!(sent[0].from, "noreply@moviemood.test");
        assert!(sent[0].body.contains(&format!("http://moviemood.test/films/{}/", film.id)));

        let sub = test_support::reload_subscription(&db, sub.id).await;
        assert_eq!(sub.last_notified, Some(n.created_at));
    }

    #[tokio::test]
    async fn repeated_dispatch_does_not_duplicate() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let ann = test_support::user(&db, "ann").await;
        test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        let film = test_support::film(&db, "Amelie", true).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 8), None).await.unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Dispatcher::new(db.clone(), mailer.clone(), settings());
        dispatcher.notify_subscribers(film.id).await.unwrap();
        let second = dispatcher.notify_subscribers(film.id).await.unwrap();

        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(notifications(&db).await.len(), 1);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_keeps_notification_and_continues() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let ann = test_support::user(&db, "ann").await;
        let bob = test_support::user(&db, "bob").await;
        let ann_sub = test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        test_support::subscription(&db, bob.id, joy.id, 5, true).await;
        let film = test_support::film(&db, "Amelie", true).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 8), None).await.unwrap();

        let mailer = Arc::new(FailingMailer::for_recipient(&ann.email));
        let dispatcher = Dispatcher::new(db.clone(), mailer.clone(), settings());
        let report = dispatcher.notify_subscribers(film.id).await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.emailed, 1);
        assert_eq!(report.failed, 0);

        let stored = notifications(&db).await;
        let for_ann = stored.iter().find(|n| n.user_id == ann.id).unwrap();
        let for_bob = stored.iter().find(|n| n.user_id == bob.id).unwrap();
        assert!(!for_ann.sent_via_email);
        assert!(for_bob.sent_via_email);

        // the subscription is stamped regardless of delivery outcome
        let ann_sub = test_support::reload_subscription(&db, ann_sub.id).await;
        assert_eq!(ann_sub.last_notified, Some(for_ann.created_at));
    }

    #[tokio::test]
    async fn email_opt_out_still_creates_notification() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let ann = test_support::user(&db, "ann").await;
        test_support::set_email_notifications(&db, ann.id, false).await;
        test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        let film = test_support::film(&db, "Amelie", true).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 8), None).await.unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Dispatcher::new(db.clone(), mailer.clone(), settings());
        let report = dispatcher.notify_subscribers(film.id).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.emailed, 0);
        assert!(mailer.sent().is_empty());
        assert!(!notifications(&db).await[0].sent_via_email);
    }

    #[tokio::test]
    async fn unpublished_film_is_ignored() {
        let db = test_support::db().await;
        let joy = test_support::emotion(&db, "Joy").await;
        let ann = test_support::user(&db, "ann").await;
        test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        let film = test_support::film(&db, "Draft", false).await;
        set_rating(&db, film.id, &test_support::rating(joy.id, 8), None).await.unwrap();

        let dispatcher =
            Dispatcher::new(db.clone(), Arc::new(RecordingMailer::default()), settings());
        let report = dispatcher.notify_subscribers(film.id).await.unwrap();

        assert_eq!(report, DispatchReport::default());
        assert!(notifications(&db).await.is_empty());
    }

    #[test]
    fn email_body_truncates_long_descriptions() {
        let film = film::Model {
            id: 7,
            title: "Long".into(),
            original_title: String::new(),
            description: "x".repeat(500),
            year: 2001,
            duration: 120,
            poster: None,
            trailer_url: String::new(),
            country: "Japan".into(),
            director: "Someone".into(),
            genre: "animation".into(),
            rating: 0.0,
            views_count: 0,
            is_published: true,
            created_by: None,
            created_at: 0,
            updated_at: 0,
        };
        let user = user::Model {
            id: 1,
            username: "ann".into(),
            email: "ann@example.com".into(),
            password_hash: String::new(),
            is_staff: false,
            created_at: 0,
        };
        let m = SubscriptionMatch {
            subscription: subscription::Model {
                id: 1,
                user_id: 1,
                emotion_id: 1,
                min_intensity: 5,
                is_active: true,
                created_at: 0,
                last_notified: None,
            },
            emotion: test_support::emotion_model(1, "Wonder"),
            intensity: 9,
        };

        let mail = compose_email(&settings(), &user, &film, &m);
        assert!(mail.body.contains(&format!("Description: {}...", "x".repeat(200))));
        assert!(!mail.body.contains(&"x".repeat(201)));
        assert!(mail.body.contains("Genre: Animation"));
        assert_eq!(mail.subject, "New film for your subscription: \"Long\"");
    }
}
