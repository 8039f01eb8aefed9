use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::{CookieJar, Query as MultiQuery};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::{CurrentUser, SESSION_COOKIE, StaffUser, expired_session_cookie, session_cookie},
    catalog::{AdminFilmQuery, ApiFilmQuery, BrowseQuery},
    error::AppResult,
    models::{
        EmotionInput, EmotionOut, FilmBrowse, FilmDetail, FilmInput, FilmSummary, FilmView,
        LoginRequest, NotificationOut, Page, ProfileEntry, ProfileUpdate, ProfileView, RatingInput,
        RegisterRequest, SubscriptionInput, SubscriptionOut, UserOut,
    },
};

type AppStateRef = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(browse_films))
        .route("/films", get(browse_films))
        .route("/films/{id}", get(view_film))
        .route("/films/{id}/", get(view_film))
        .nest("/api", api_routes())
        .nest("/users", user_routes())
        .nest("/notifications", notification_routes())
        .nest("/admin", admin_routes())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/films", get(api_films))
        .route("/films/by_emotion", get(api_films_by_emotion))
        .route("/films/{id}", get(api_film))
        .route("/films/{id}/emotion_profile", get(api_emotion_profile))
        .route("/emotions", get(api_emotions))
        .route("/emotions/{id}", get(api_emotion))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(profile).put(update_profile))
        .route("/favorite/{film_id}", post(toggle_favorite))
}

fn notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(notifications))
        .route("/subscriptions", get(subscriptions).post(subscribe))
        .route("/subscriptions/{id}", delete(unsubscribe))
        .route("/subscriptions/{id}/toggle", post(toggle_subscription))
        .route("/{id}/read", post(mark_read))
        .route("/mark-all-read", post(mark_all_read))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/emotions", get(admin_emotions).post(create_emotion))
        .route("/emotions/{id}", put(update_emotion))
        .route("/films", get(admin_films).post(create_film))
        .route("/films/{id}", get(admin_film).put(update_film))
        .route("/films/{id}/ratings", put(set_film_rating))
        .route("/films/{id}/ratings/{emotion_id}", delete(delete_film_rating))
}

// ---- /api ----

async fn api_films(
    State(state): AppStateRef,
    Query(q): Query<ApiFilmQuery>,
) -> AppResult<Json<Page<FilmSummary>>> {
    Ok(Json(state.catalog.api_films(&q).await?))
}

#[derive(Debug, Deserialize)]
struct ByEmotionQuery {
    #[serde(default)]
    emotion_ids: Vec<i32>,
    min_intensity: Option<String>,
}

async fn api_films_by_emotion(
    State(state): AppStateRef,
    MultiQuery(q): MultiQuery<ByEmotionQuery>,
) -> AppResult<Json<Vec<FilmDetail>>> {
    Ok(Json(state.catalog.films_by_emotion(&q.emotion_ids, q.min_intensity.as_deref()).await?))
}

async fn api_film(State(state): AppStateRef, Path(id): Path<i32>) -> AppResult<Json<FilmDetail>> {
    Ok(Json(state.catalog.api_film(id).await?))
}

async fn api_emotion_profile(
    State(state): AppStateRef,
    Path(id): Path<i32>,
) -> AppResult<Json<BTreeMap<String, ProfileEntry>>> {
    Ok(Json(state.catalog.emotion_profile(id).await?))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

async fn api_emotions(
    State(state): AppStateRef,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<EmotionOut>>> {
    let emotions = state.catalog.emotions(q.search.as_deref()).await?;
    Ok(Json(emotions.into_iter().map(EmotionOut::from).collect()))
}

async fn api_emotion(State(state): AppStateRef, Path(id): Path<i32>) -> AppResult<Json<EmotionOut>> {
    Ok(Json(state.catalog.emotion(id).await?.into()))
}

// ---- site ----

async fn browse_films(
    State(state): AppStateRef,
    MultiQuery(q): MultiQuery<BrowseQuery>,
) -> AppResult<Json<FilmBrowse>> {
    Ok(Json(state.catalog.browse_films(&q).await?))
}

async fn view_film(State(state): AppStateRef, Path(id): Path<i32>) -> AppResult<Json<FilmView>> {
    Ok(Json(state.catalog.view_film(id).await?))
}

// ---- /users ----

async fn register(
    State(state): AppStateRef,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.accounts.register(req).await?;
    let jar = jar.add(session_cookie(session.token, state.accounts.session_ttl_seconds()));
    Ok((StatusCode::CREATED, jar, Json(UserOut::from(session.user))))
}

async fn login(
    State(state): AppStateRef,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.accounts.login(req).await?;
    let jar = jar.add(session_cookie(session.token, state.accounts.session_ttl_seconds()));
    Ok((jar, Json(UserOut::from(session.user))))
}

async fn logout(State(state): AppStateRef, jar: CookieJar) -> AppResult<impl IntoResponse> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.accounts.logout(cookie.value()).await?;
    }
    Ok((jar.remove(expired_session_cookie()), StatusCode::NO_CONTENT))
}

async fn profile(State(state): AppStateRef, CurrentUser(user): CurrentUser) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.accounts.profile(&user).await?))
}

async fn update_profile(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.accounts.update_profile(&user, update).await?))
}

async fn toggle_favorite(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(film_id): Path<i32>,
) -> AppResult<Json<Value>> {
    let favorite = state.accounts.toggle_favorite(user.id, film_id).await?;
    Ok(Json(json!({ "film_id": film_id, "favorite": favorite })))
}

// ---- /notifications ----

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u64>,
}

async fn notifications(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Page<NotificationOut>>> {
    Ok(Json(state.inbox.notifications(user.id, q.page).await?))
}

async fn subscriptions(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<SubscriptionOut>>> {
    Ok(Json(state.inbox.subscriptions(user.id).await?))
}

async fn subscribe(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Json(input): Json<SubscriptionInput>,
) -> AppResult<impl IntoResponse> {
    let created = state.inbox.subscribe(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn unsubscribe(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.inbox.unsubscribe(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_subscription(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<SubscriptionOut>> {
    Ok(Json(state.inbox.toggle_subscription(user.id, id).await?))
}

async fn mark_read(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<NotificationOut>> {
    Ok(Json(state.inbox.mark_read(user.id, id).await?))
}

async fn mark_all_read(State(state): AppStateRef, CurrentUser(user): CurrentUser) -> AppResult<Json<Value>> {
    let updated = state.inbox.mark_all_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

// ---- /admin ----

async fn admin_emotions(State(state): AppStateRef, _staff: StaffUser) -> AppResult<Json<Vec<EmotionOut>>> {
    let emotions = state.catalog.all_emotions().await?;
    Ok(Json(emotions.into_iter().map(EmotionOut::from).collect()))
}

async fn create_emotion(
    State(state): AppStateRef,
    _staff: StaffUser,
    Json(input): Json<EmotionInput>,
) -> AppResult<impl IntoResponse> {
    let created = state.catalog.create_emotion(input).await?;
    Ok((StatusCode::CREATED, Json(EmotionOut::from(created))))
}

async fn update_emotion(
    State(state): AppStateRef,
    _staff: StaffUser,
    Path(id): Path<i32>,
    Json(input): Json<EmotionInput>,
) -> AppResult<Json<EmotionOut>> {
    Ok(Json(state.catalog.update_emotion(id, input).await?.into()))
}

async fn admin_films(
    State(state): AppStateRef,
    _staff: StaffUser,
    Query(q): Query<AdminFilmQuery>,
) -> AppResult<Json<Page<FilmSummary>>> {
    Ok(Json(state.catalog.admin_films(&q).await?))
}

async fn admin_film(
    State(state): AppStateRef,
    _staff: StaffUser,
    Path(id): Path<i32>,
) -> AppResult<Json<FilmDetail>> {
    Ok(Json(state.catalog.admin_film(id).await?))
}

async fn create_film(
    State(state): AppStateRef,
    StaffUser(staff): StaffUser,
    Json(input): Json<FilmInput>,
) -> AppResult<impl IntoResponse> {
    let created = state.catalog.create_film(input, Some(staff.id)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_film(
    State(state): AppStateRef,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
    Json(input): Json<FilmInput>,
) -> AppResult<Json<FilmDetail>> {
    Ok(Json(state.catalog.update_film(id, input, Some(staff.id)).await?))
}

async fn set_film_rating(
    State(state): AppStateRef,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
    Json(input): Json<RatingInput>,
) -> AppResult<Json<FilmDetail>> {
    Ok(Json(state.catalog.set_film_rating(id, input, Some(staff.id)).await?))
}

async fn delete_film_rating(
    State(state): AppStateRef,
    _staff: StaffUser,
    Path((id, emotion_id)): Path<(i32, i32)>,
) -> AppResult<Json<FilmDetail>> {
    Ok(Json(state.catalog.delete_film_rating(id, emotion_id).await?))
}
