pub mod emotion;
pub mod favorite_film;
pub mod film;
pub mod film_emotion_rating;
pub mod notification;
pub mod preferred_emotion;
pub mod session;
pub mod subscription;
pub mod user;
pub mod user_profile;
