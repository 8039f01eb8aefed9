//! Fixtures shared by the in-crate tests.

use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::{
    config::{Config, EmailBackend, EmailConfig},
    db::connect_and_migrate,
    entities::{emotion, film, subscription, user, user_profile},
    error::{AppError, AppResult},
    mailer::{Mailer, OutgoingMail},
    models::RatingInput,
};

/// Console mail, fast bcrypt and `moviemood.test` as the link host.
pub fn config() -> Config {
    Config {
        addr: ([127, 0, 0, 1], 0).into(),
        database_url: "sqlite::memory:".to_string(),
        site_host: "moviemood.test".to_string(),
        email: EmailConfig {
            backend: EmailBackend::Console,
            host: "localhost".to_string(),
            port: 25,
            use_ssl: false,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@moviemood.test".to_string(),
            rps: 5,
        },
        session_ttl_days: 14,
        bcrypt_cost: 4,
        admin: None,
    }
}

pub async fn db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:").await.expect("in-memory database")
}

pub async fn emotion(db: &DatabaseConnection, name: &str) -> emotion::Model {
    emotion_with_slug(db, name, &slug::slugify(name)).await
}

pub async fn emotion_with_slug(db: &DatabaseConnection, name: &str, slug: &str) -> emotion::Model {
    emotion::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        description: Set(format!("{name} description")),
        color: Set("#FF6B6B".to_string()),
        icon: Set("star".to_string()),
        is_active: Set(true),
        created_at: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert emotion")
}

pub fn emotion_model(id: i32, name: &str) -> emotion::Model {
    emotion::Model {
        id,
        name: name.to_string(),
        slug: slug::slugify(name),
        description: String::new(),
        color: "#FF6B6B".to_string(),
        icon: String::new(),
        is_active: true,
        created_at: 0,
    }
}

pub async fn deactivate_emotion(db: &DatabaseConnection, id: i32) {
    emotion::ActiveModel { id: Set(id), is_active: Set(false), ..Default::default() }
        .update(db)
        .await
        .expect("deactivate emotion");
}

/// A drama from 2001 with no ratings.
pub async fn film(db: &DatabaseConnection, title: &str, is_published: bool) -> film::Model {
    film::ActiveModel {
        title: Set(title.to_string()),
        original_title: Set(String::new()),
        description: Set(format!("{title} is a film.")),
        year: Set(2001),
        duration: Set(122),
        poster: Set(None),
        trailer_url: Set(String::new()),
        country: Set("France".to_string()),
        director: Set("Jean-Pierre Jeunet".to_string()),
        genre: Set("drama".to_string()),
        rating: Set(0.0),
        views_count: Set(0),
        is_published: Set(is_published),
        created_by: Set(None),
        created_at: Set(0),
        updated_at: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert film")
}

pub fn rating(emotion_id: i32, intensity: i32) -> RatingInput {
    RatingInput { emotion_id, intensity, description: String::new() }
}

pub async fn film_rating(db: &DatabaseConnection, film_id: i32) -> f64 {
    film::Entity::find_by_id(film_id).one(db).await.unwrap().expect("film exists").rating
}

/// A user with email `{username}@example.com` and a default profile.
pub async fn user(db: &DatabaseConnection, username: &str) -> user::Model {
    let user = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set(String::new()),
        is_staff: Set(false),
        created_at: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user");

    user_profile::ActiveModel {
        user_id: Set(user.id),
        first_name: Set(None),
        last_name: Set(None),
        avatar: Set(None),
        bio: Set(String::new()),
        notification_frequency: Set("daily".to_string()),
        email_notifications: Set(true),
        telegram_id: Set(String::new()),
        created_at: Set(0),
    }
    .insert(db)
    .await
    .expect("insert profile");

    user
}

pub async fn set_email_notifications(db: &DatabaseConnection, user_id: i32, enabled: bool) {
    user_profile::ActiveModel {
        user_id: Set(user_id),
        email_notifications: Set(enabled),
        ..Default::default()
    }
    .update(db)
    .await
    .expect("update profile");
}

pub async fn subscription(
    db: &DatabaseConnection,
    user_id: i32,
    emotion_id: i32,
    min_intensity: i32,
    is_active: bool,
) -> subscription::Model {
    subscription::ActiveModel {
        user_id: Set(user_id),
        emotion_id: Set(emotion_id),
        min_intensity: Set(min_intensity),
        is_active: Set(is_active),
        created_at: Set(0),
        last_notified: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert subscription")
}

pub async fn reload_subscription(db: &DatabaseConnection, id: i32) -> subscription::Model {
    subscription::Entity::find_by_id(id).one(db).await.unwrap().expect("subscription exists")
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, AppResult<()>> {
        async move {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
        .boxed()
    }
}

/// Fails for one recipient and records everything else.
pub struct FailingMailer {
    recipient: String,
    inner: RecordingMailer,
}

impl FailingMailer {
    pub fn for_recipient(recipient: &str) -> Self {
        Self { recipient: recipient.to_string(), inner: RecordingMailer::default() }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.inner.sent()
    }
}

impl Mailer for FailingMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, AppResult<()>> {
        if mail.to == self.recipient {
            return async move { Err(AppError::Mail(format!("mailbox {} unavailable", mail.to))) }
                .boxed();
        }
        self.inner.send(mail)
    }
}
