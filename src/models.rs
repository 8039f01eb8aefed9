use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::entities::{emotion, film, film_emotion_rating, notification, subscription, user, user_profile};

pub const MIN_INTENSITY: i32 = 1;
pub const MAX_INTENSITY: i32 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Action,
    Comedy,
    Drama,
    Horror,
    SciFi,
    Romance,
    Thriller,
    Documentary,
    Animation,
    Fantasy,
}

impl Genre {
    pub const ALL: [Genre; 10] = [
        Genre::Action,
        Genre::Comedy,
        Genre::Drama,
        Genre::Horror,
        Genre::SciFi,
        Genre::Romance,
        Genre::Thriller,
        Genre::Documentary,
        Genre::Animation,
        Genre::Fantasy,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            Genre::Action => "action",
            Genre::Comedy => "comedy",
            Genre::Drama => "drama",
            Genre::Horror => "horror",
            Genre::SciFi => "sci_fi",
            Genre::Romance => "romance",
            Genre::Thriller => "thriller",
            Genre::Documentary => "documentary",
            Genre::Animation => "animation",
            Genre::Fantasy => "fantasy",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Comedy => "Comedy",
            Genre::Drama => "Drama",
            Genre::Horror => "Horror",
            Genre::SciFi => "Science fiction",
            Genre::Romance => "Romance",
            Genre::Thriller => "Thriller",
            Genre::Documentary => "Documentary",
            Genre::Animation => "Animation",
            Genre::Fantasy => "Fantasy",
        }
    }
}

/// Label for a stored genre code; unknown codes are shown verbatim.
pub fn genre_label(code: &str) -> &str {
    Genre::from_code(code).map(Genre::label).unwrap_or(code)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewFilm,
    Subscription,
    System,
    Recommendation,
}

impl NotificationType {
    pub fn as_code(self) -> &'static str {
        match self {
            NotificationType::NewFilm => "new_film",
            NotificationType::Subscription => "subscription",
            NotificationType::System => "system",
            NotificationType::Recommendation => "recommendation",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    #[default]
    Daily,
    Weekly,
}

impl NotificationFrequency {
    pub fn as_code(self) -> &'static str {
        match self {
            NotificationFrequency::Daily => "daily",
            NotificationFrequency::Weekly => "weekly",
        }
    }
}

// ---- read models ----

#[derive(Clone, Debug, Serialize)]
pub struct EmotionOut {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
    pub icon: String,
}

impl From<emotion::Model> for EmotionOut {
    fn from(e: emotion::Model) -> Self {
        Self {
            id: e.id,
            name: e.name,
            slug: e.slug,
            description: e.description,
            color: e.color,
            icon: e.icon,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FilmSummary {
    pub id: i32,
    pub title: String,
    pub year: i32,
    pub director: String,
    pub genre: String,
    pub rating: f64,
    pub poster: Option<String>,
    pub duration: i32,
}

impl From<film::Model> for FilmSummary {
    fn from(f: film::Model) -> Self {
        Self {
            id: f.id,
            title: f.title,
            year: f.year,
            director: f.director,
            genre: f.genre,
            rating: f.rating,
            poster: f.poster,
            duration: f.duration,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RatingOut {
    pub emotion: EmotionOut,
    pub intensity: i32,
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct FilmDetail {
    pub id: i32,
    pub title: String,
    pub original_title: String,
    pub description: String,
    pub year: i32,
    pub duration: i32,
    pub duration_hours: String,
    pub poster: Option<String>,
    pub trailer_url: String,
    pub country: String,
    pub director: String,
    pub genre: String,
    pub genre_label: String,
    pub rating: f64,
    pub views_count: i32,
    pub is_published: bool,
    pub created_at: i64,
    pub emotion_ratings: Vec<RatingOut>,
    pub emotion_profile: BTreeMap<String, i32>,
}

impl FilmDetail {
    /// `ratings` are expected in display order (strongest first).
    pub fn new(f: film::Model, ratings: Vec<(film_emotion_rating::Model, emotion::Model)>) -> Self {
        let emotion_profile =
            ratings.iter().map(|(r, e)| (e.name.clone(), r.intensity)).collect::<BTreeMap<_, _>>();
        let emotion_ratings = ratings
            .into_iter()
            .map(|(r, e)| RatingOut {
                emotion: e.into(),
                intensity: r.intensity,
                description: r.description,
            })
            .collect();

        Self {
            duration_hours: duration_hours(f.duration),
            genre_label: genre_label(&f.genre).to_string(),
            id: f.id,
            title: f.title,
            original_title: f.original_title,
            description: f.description,
            year: f.year,
            duration: f.duration,
            poster: f.poster,
            trailer_url: f.trailer_url,
            country: f.country,
            director: f.director,
            genre: f.genre,
            rating: f.rating,
            views_count: f.views_count,
            is_published: f.is_published,
            created_at: f.created_at,
            emotion_ratings,
            emotion_profile,
        }
    }
}

pub fn duration_hours(minutes: i32) -> String {
    format!("{}h {}min", minutes / 60, minutes % 60)
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileEntry {
    pub intensity: i32,
    pub color: String,
    pub icon: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub num_pages: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GenreChoice {
    pub code: &'static str,
    pub label: &'static str,
}

impl From<Genre> for GenreChoice {
    fn from(g: Genre) -> Self {
        Self { code: g.as_code(), label: g.label() }
    }
}

/// The browse page: one page of films plus the filter choices.
#[derive(Clone, Debug, Serialize)]
pub struct FilmBrowse {
    pub films: Page<FilmSummary>,
    pub emotions: Vec<EmotionOut>,
    pub genres: Vec<GenreChoice>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FilmView {
    pub film: FilmDetail,
    pub similar_films: Vec<FilmSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubscriptionOut {
    pub id: i32,
    pub emotion: EmotionOut,
    pub min_intensity: i32,
    pub is_active: bool,
    pub created_at: i64,
    pub last_notified: Option<i64>,
}

impl SubscriptionOut {
    pub fn new(s: subscription::Model, e: emotion::Model) -> Self {
        Self {
            id: s.id,
            emotion: e.into(),
            min_intensity: s.min_intensity,
            is_active: s.is_active,
            created_at: s.created_at,
            last_notified: s.last_notified,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationOut {
    pub id: i32,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub film_id: Option<i32>,
    pub emotion_id: Option<i32>,
    pub subscription_id: Option<i32>,
    pub is_read: bool,
    pub sent_via_email: bool,
    pub sent_via_telegram: bool,
    pub created_at: i64,
}

impl From<notification::Model> for NotificationOut {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            title: n.title,
            message: n.message,
            film_id: n.film_id,
            emotion_id: n.emotion_id,
            subscription_id: n.subscription_id,
            is_read: n.is_read,
            sent_via_email: n.sent_via_email,
            sent_via_telegram: n.sent_via_telegram,
            created_at: n.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UserOut {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

impl From<user::Model> for UserOut {
    fn from(u: user::Model) -> Self {
        Self { id: u.id, username: u.username, email: u.email, is_staff: u.is_staff }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
    pub user: UserOut,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub notification_frequency: String,
    pub email_notifications: bool,
    pub telegram_id: String,
    pub preferred_emotions: Vec<EmotionOut>,
    pub favorite_films: Vec<FilmSummary>,
    pub subscriptions: Vec<SubscriptionOut>,
    pub unread_notifications: Vec<NotificationOut>,
}

pub fn full_name(profile: &user_profile::Model) -> String {
    [profile.first_name.as_deref(), profile.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---- write models ----

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct EmotionInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    #[validate(custom(function = "validate_color"))]
    pub color: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub icon: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RatingInput {
    pub emotion_id: i32,
    #[validate(range(min = 1, max = 10))]
    pub intensity: i32,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct FilmInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub original_title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1895, max = 2030))]
    pub year: i32,
    #[validate(range(min = 1))]
    pub duration: i32,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub trailer_url: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(length(min = 1, max = 200))]
    pub director: String,
    pub genre: Genre,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    #[validate(nested)]
    pub ratings: Vec<RatingInput>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SubscriptionInput {
    pub emotion_id: i32,
    #[serde(default = "default_min_intensity")]
    #[validate(range(min = 1, max = 10))]
    pub min_intensity: i32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(must_match(other = "password"))]
    pub password_confirm: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub preferred_emotions: Vec<i32>,
    #[serde(default)]
    pub notification_frequency: NotificationFrequency,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub telegram_id: String,
}

fn default_true() -> bool {
    true
}

fn default_color() -> String {
    "#FF6B6B".to_string()
}

fn default_min_intensity() -> i32 {
    5
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid { Ok(()) } else { Err(ValidationError::new("color")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_codes_round_trip_and_have_labels() {
        for genre in Genre::ALL {
            assert_eq!(Genre::from_code(genre.as_code()), Some(genre));
        }
        assert_eq!(genre_label("sci_fi"), "Science fiction");
        assert_eq!(genre_label("western"), "western");
    }

    #[test]
    fn full_name_skips_missing_parts() {
        let mut profile = user_profile::Model {
            user_id: 1,
            first_name: None,
            last_name: None,
            avatar: None,
            bio: String::new(),
            notification_frequency: "daily".into(),
            email_notifications: true,
            telegram_id: String::new(),
            created_at: 0,
        };
        assert_eq!(full_name(&profile), "");

        profile.first_name = Some("Ann".into());
        assert_eq!(full_name(&profile), "Ann");
        profile.last_name = Some("Lee".into());
        assert_eq!(full_name(&profile), "Ann Lee");
    }

    #[test]
    fn duration_is_rendered_in_hours_and_minutes() {
        assert_eq!(duration_hours(169), "2h 49min");
        assert_eq!(duration_hours(45), "0h 45min");
    }

    #[test]
    fn film_input_rejects_out_of_range_values() {
        let input: FilmInput = serde_json::from_value(serde_json::json!({
            "title": "Metropolis",
            "year": 1890,
            "duration": 0,
            "country": "Germany",
            "director": "Fritz Lang",
            "genre": "sci_fi",
            "ratings": [{"emotion_id": 1, "intensity": 11}],
        }))
        .unwrap();

        let errors = input.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("year"));
        assert!(fields.contains_key("duration"));
        assert!(fields.contains_key("ratings"));
    }

    #[test]
    fn emotion_color_must_be_hex() {
        let mut input: EmotionInput =
            serde_json::from_value(serde_json::json!({"name": "Joy"})).unwrap();
        assert_eq!(input.color, "#FF6B6B");
        assert!(input.validate().is_ok());

        input.color = "red".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn register_request_requires_matching_passwords() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "ann",
            "email": "ann@example.com",
            "password": "correct horse",
            "password_confirm": "battery staple",
        }))
        .unwrap();
        assert!(req.validate().unwrap_err().errors().contains_key("password_confirm"));
    }
}
