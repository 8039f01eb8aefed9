use std::collections::BTreeSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set,
};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::now_sec,
    entities::{
        emotion, favorite_film, film, notification, preferred_emotion, session, subscription, user,
        user_profile,
    },
    error::{AppError, AppResult},
    models::{
        EmotionOut, FilmSummary, LoginRequest, NotificationFrequency, NotificationOut, ProfileUpdate,
        ProfileView, RegisterRequest, SubscriptionOut, full_name,
    },
    transaction::Transaction,
};

const PROFILE_UNREAD_LIMIT: u64 = 10;

/// A signed-in user and the token identifying the session.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub user: user::Model,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct Accounts {
    db: DatabaseConnection,
    session_ttl_seconds: i64,
    bcrypt_cost: u32,
}

impl Accounts {
    pub fn new(db: DatabaseConnection, session_ttl_days: i64, bcrypt_cost: u32) -> Self {
        Self { db, session_ttl_seconds: session_ttl_days * 86_400, bcrypt_cost }
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Creates the user with a default profile and signs them in.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<Session> {
        req.validate()?;
        let username = req.username.trim();
        let email = req.email.trim();

        if self.find_user(username).await?.is_some() {
            return Err(AppError::validation("a user with that username already exists"));
        }
        let email_taken =
            user::Entity::find().filter(user::Column::Email.eq(email)).count(&self.db).await? > 0;
        if email_taken {
            return Err(AppError::validation("a user with that email already exists"));
        }

        let password_hash = hash_password(req.password, self.bcrypt_cost).await?;

        let tx = Transaction::begin(&self.db).await?;
        let user = user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            is_staff: Set(false),
            created_at: Set(now_sec()),
            ..Default::default()
        }
        .insert(tx.conn())
        .await?;
        insert_profile(tx.conn(), user.id, non_empty(req.first_name), non_empty(req.last_name))
            .await?;
        tx.commit().await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        self.start_session(user).await
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<Session> {
        let Some(user) = self.find_user(req.username.trim()).await? else {
            debug!(username = %req.username, "login for unknown user");
            return Err(AppError::Unauthorized);
        };
        if !verify_password(req.password, user.password_hash.clone()).await? {
            debug!(username = %user.username, "login with wrong password");
            return Err(AppError::Unauthorized);
        }
        self.start_session(user).await
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        session::Entity::delete_by_id(token.to_string()).exec(&self.db).await?;
        Ok(())
    }

    /// The user behind a live session token. Expired sessions are removed.
    pub async fn user_for_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        let Some(session) = session::Entity::find_by_id(token.to_string()).one(&self.db).await? else {
            return Ok(None);
        };
        if session.expires_at <= now_sec() {
            debug!(user_id = session.user_id, "session expired");
            session::Entity::delete_by_id(session.token).exec(&self.db).await?;
            return Ok(None);
        }
        Ok(user::Entity::find_by_id(session.user_id).one(&self.db).await?)
    }

    /// Creates the staff account, or promotes and resets an existing user of
    /// the same name.
    pub async fn ensure_staff(&self, username: &str, email: &str, password: &str) -> AppResult<user::Model> {
        let password_hash = hash_password(password.to_string(), self.bcrypt_cost).await?;

        let tx = Transaction::begin(&self.db).await?;
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(tx.conn())
            .await?;
        let user = match existing {
            Some(existing) => {
                let mut model: user::ActiveModel = existing.into();
                model.email = Set(email.to_string());
                model.password_hash = Set(password_hash);
                model.is_staff = Set(true);
                model.update(tx.conn()).await?
            },
            None => {
                user::ActiveModel {
                    username: Set(username.to_string()),
                    email: Set(email.to_string()),
                    password_hash: Set(password_hash),
                    is_staff: Set(true),
                    created_at: Set(now_sec()),
                    ..Default::default()
                }
                .insert(tx.conn())
                .await?
            },
        };
        ensure_profile(tx.conn(), user.id).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn profile(&self, user: &user::Model) -> AppResult<ProfileView> {
        let profile = ensure_profile(&self.db, user.id).await?;

        let preferred_emotions = emotion::Entity::find()
            .filter(
                emotion::Column::Id.in_subquery(
                    preferred_emotion::Entity::find()
                        .select_only()
                        .column(preferred_emotion::Column::EmotionId)
                        .filter(preferred_emotion::Column::UserId.eq(user.id))
                        .into_query(),
                ),
            )
            .order_by_asc(emotion::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(EmotionOut::from)
            .collect();

        let favorite_films = film::Entity::find()
            .filter(
                film::Column::Id.in_subquery(
                    favorite_film::Entity::find()
                        .select_only()
                        .column(favorite_film::Column::FilmId)
                        .filter(favorite_film::Column::UserId.eq(user.id))
                        .into_query(),
                ),
            )
            .order_by_asc(film::Column::Title)
            .all(&self.db)
            .await?
            .into_iter()
            .map(FilmSummary::from)
            .collect();

        let subscriptions = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user.id))
            .filter(subscription::Column::IsActive.eq(true))
            .order_by_desc(subscription::Column::CreatedAt)
            .order_by_desc(subscription::Column::Id)
            .find_also_related(emotion::Entity)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(s, e)| e.map(|e| SubscriptionOut::new(s, e)))
            .collect();

        let unread_notifications = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user.id))
            .filter(notification::Column::IsRead.eq(false))
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .limit(PROFILE_UNREAD_LIMIT)
            .all(&self.db)
            .await?
            .into_iter()
            .map(NotificationOut::from)
            .collect();

        Ok(ProfileView {
            user: user.clone().into(),
            full_name: full_name(&profile),
            first_name: profile.first_name,
            last_name: profile.last_name,
            avatar: profile.avatar,
            bio: profile.bio,
            notification_frequency: profile.notification_frequency,
            email_notifications: profile.email_notifications,
            telegram_id: profile.telegram_id,
            preferred_emotions,
            favorite_films,
            subscriptions,
            unread_notifications,
        })
    }

    /// Replaces the editable profile fields. Preferred emotions must all be
    /// active.
    pub async fn update_profile(&self, user: &user::Model, update: ProfileUpdate) -> AppResult<ProfileView> {
        update.validate()?;

        let wanted: BTreeSet<i32> = update.preferred_emotions.iter().copied().collect();
        if !wanted.is_empty() {
            let active = emotion::Entity::find()
                .filter(emotion::Column::Id.is_in(wanted.iter().copied()))
                .filter(emotion::Column::IsActive.eq(true))
                .count(&self.db)
                .await?;
            if active != wanted.len() as u64 {
                return Err(AppError::validation("preferred emotions must be active emotions"));
            }
        }

        let tx = Transaction::begin(&self.db).await?;
        let profile = ensure_profile(tx.conn(), user.id).await?;
        let mut model: user_profile::ActiveModel = profile.into();
        model.first_name = Set(non_empty(update.first_name));
        model.last_name = Set(non_empty(update.last_name));
        model.avatar = Set(non_empty(update.avatar));
        model.bio = Set(update.bio);
        model.notification_frequency = Set(update.notification_frequency.as_code().to_string());
        model.email_notifications = Set(update.email_notifications);
        model.telegram_id = Set(update.telegram_id.trim().to_string());
        model.update(tx.conn()).await?;

        preferred_emotion::Entity::delete_many()
            .filter(preferred_emotion::Column::UserId.eq(user.id))
            .exec(tx.conn())
            .await?;
        if !wanted.is_empty() {
            preferred_emotion::Entity::insert_many(wanted.iter().map(|&emotion_id| {
                preferred_emotion::ActiveModel { user_id: Set(user.id), emotion_id: Set(emotion_id) }
            }))
            .exec(tx.conn())
            .await?;
        }
        tx.commit().await?;

        debug!(user_id = user.id, preferred = wanted.len(), "profile updated");
        self.profile(user).await
    }

    /// Adds a published film to the user's favorites, or removes it if it is
    /// already there. Returns whether the film is now a favorite.
    pub async fn toggle_favorite(&self, user_id: i32, film_id: i32) -> AppResult<bool> {
        let visible = film::Entity::find_by_id(film_id)
            .filter(film::Column::IsPublished.eq(true))
            .count(&self.db)
            .await?
            > 0;
        if !visible {
            return Err(AppError::not_found(format!("film {film_id}")));
        }

        let key = (user_id, film_id);
        if favorite_film::Entity::find_by_id(key).one(&self.db).await?.is_some() {
            favorite_film::Entity::delete_by_id(key).exec(&self.db).await?;
            return Ok(false);
        }

        favorite_film::ActiveModel {
            user_id: Set(user_id),
            film_id: Set(film_id),
            created_at: Set(now_sec()),
        }
        .insert(&self.db)
        .await?;
        Ok(true)
    }

    async fn find_user(&self, username: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find().filter(user::Column::Username.eq(username)).one(&self.db).await?)
    }

    async fn start_session(&self, user: user::Model) -> AppResult<Session> {
        let now = now_sec();
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.session_ttl_seconds;

        session::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user.id),
            created_at: Set(now),
            expires_at: Set(expires_at),
        }
        .insert(&self.db)
        .await?;

        debug!(user_id = user.id, "session started");
        Ok(Session { token, user, expires_at })
    }
}

/// The profile row, created with defaults on first access.
pub async fn ensure_profile<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<user_profile::Model> {
    if let Some(profile) = user_profile::Entity::find_by_id(user_id).one(conn).await? {
        return Ok(profile);
    }
    insert_profile(conn, user_id, None, None).await
}

async fn insert_profile<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    first_name: Option<String>,
    last_name: Option<String>,
) -> AppResult<user_profile::Model> {
    Ok(user_profile::ActiveModel {
        user_id: Set(user_id),
        first_name: Set(first_name),
        last_name: Set(last_name),
        avatar: Set(None),
        bio: Set(String::new()),
        notification_frequency: Set(NotificationFrequency::default().as_code().to_string()),
        email_notifications: Set(true),
        telegram_id: Set(String::new()),
        created_at: Set(now_sec()),
    }
    .insert(conn)
    .await?)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

/// A malformed stored hash counts as a mismatch.
async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn accounts(db: &DatabaseConnection) -> Accounts {
        Accounts::new(db.clone(), 14, 4)
    }

    fn register_request(username: &str) -> RegisterRequest {
        serde_json::from_value(serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct horse",
            "password_confirm": "correct horse",
            "first_name": "Ann",
        }))
        .unwrap()
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest { username: username.into(), password: password.into() }
    }

    #[tokio::test]
    async fn register_creates_profile_and_session() {
        let db = test_support::db().await;
        let accounts = accounts(&db);

        let session = accounts.register(register_request("ann")).await.unwrap();
        let user = accounts.user_for_token(&session.token).await.unwrap().unwrap();
        assert_eq!(user.username, "ann");
        assert!(!user.is_staff);

        let profile = user_profile::Entity::find_by_id(user.id).one(&db).await.unwrap().unwrap();
        assert_eq!(profile.notification_frequency, "daily");
        assert!(profile.email_notifications);
        assert_eq!(profile.first_name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let db = test_support::db().await;
        let accounts = accounts(&db);
        accounts.register(register_request("ann")).await.unwrap();

        let err = accounts.register(register_request("ann")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut same_email = register_request("bob");
        same_email.email = "ann@example.com".into();
        let err = accounts.register(same_email).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn login_checks_the_password_and_logout_ends_the_session() {
        let db = test_support::db().await;
        let accounts = accounts(&db);
        accounts.register(register_request("ann")).await.unwrap();

        assert!(matches!(
            accounts.login(login("ann", "wrong password")).await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(accounts.login(login("nobody", "x")).await, Err(AppError::Unauthorized)));

        let session = accounts.login(login("ann", "correct horse")).await.unwrap();
        assert!(accounts.user_for_token(&session.token).await.unwrap().is_some());

        accounts.logout(&session.token).await.unwrap();
        assert!(accounts.user_for_token(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let db = test_support::db().await;
        let accounts = Accounts::new(db.clone(), 0, 4);
        let session = accounts.register(register_request("ann")).await.unwrap();

        assert!(accounts.user_for_token(&session.token).await.unwrap().is_none());
        assert!(session::Entity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_staff_promotes_existing_user() {
        let db = test_support::db().await;
        let accounts = accounts(&db);
        let ann = test_support::user(&db, "ann").await;

        let staff = accounts.ensure_staff("ann", "admin@example.com", "s3cret pass").await.unwrap();
        assert_eq!(staff.id, ann.id);
        assert!(staff.is_staff);
        assert!(accounts.login(login("ann", "s3cret pass")).await.is_ok());

        let fresh = accounts.ensure_staff("root", "root@example.com", "s3cret pass").await.unwrap();
        assert!(fresh.is_staff);
        assert!(user_profile::Entity::find_by_id(fresh.id).one(&db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn profile_update_rejects_inactive_emotions() {
        let db = test_support::db().await;
        let accounts = accounts(&db);
        let ann = test_support::user(&db, "ann").await;
        let joy = test_support::emotion(&db, "Joy").await;
        let gloom = test_support::emotion(&db, "Gloom").await;
        test_support::deactivate_emotion(&db, gloom.id).await;

        let update = |ids: Vec<i32>| -> ProfileUpdate {
            serde_json::from_value(serde_json::json!({
                "first_name": "Ann",
                "bio": "likes comedies",
                "preferred_emotions": ids,
                "notification_frequency": "weekly",
                "email_notifications": false,
            }))
            .unwrap()
        };

        let err = accounts.update_profile(&ann, update(vec![joy.id, gloom.id])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let view = accounts.update_profile(&ann, update(vec![joy.id])).await.unwrap();
        assert_eq!(view.full_name, "Ann");
        assert_eq!(view.notification_frequency, "weekly");
        assert!(!view.email_notifications);
        assert_eq!(view.preferred_emotions.len(), 1);
        assert_eq!(view.preferred_emotions[0].name, "Joy");

        let view = accounts.update_profile(&ann, update(vec![])).await.unwrap();
        assert!(view.preferred_emotions.is_empty());
    }

    #[tokio::test]
    async fn favorites_toggle_for_published_films_only() {
        let db = test_support::db().await;
        let accounts = accounts(&db);
        let ann = test_support::user(&db, "ann").await;
        let shown = test_support::film(&db, "Shown", true).await;
        let hidden = test_support::film(&db, "Hidden", false).await;

        assert!(accounts.toggle_favorite(ann.id, shown.id).await.unwrap());
        let view = accounts.profile(&ann).await.unwrap();
        assert_eq!(view.favorite_films.len(), 1);

        assert!(!accounts.toggle_favorite(ann.id, shown.id).await.unwrap());
        assert!(accounts.profile(&ann).await.unwrap().favorite_films.is_empty());

        assert!(matches!(
            accounts.toggle_favorite(ann.id, hidden.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn profile_shows_active_subscriptions_only() {
        let db = test_support::db().await;
        let accounts = accounts(&db);
        let ann = test_support::user(&db, "ann").await;
        let joy = test_support::emotion(&db, "Joy").await;
        let fear = test_support::emotion(&db, "Fear").await;
        test_support::subscription(&db, ann.id, joy.id, 5, true).await;
        test_support::subscription(&db, ann.id, fear.id, 5, false).await;

        let view = accounts.profile(&ann).await.unwrap();
        assert_eq!(view.subscriptions.len(), 1);
        assert_eq!(view.subscriptions[0].emotion.name, "Joy");
    }
}
