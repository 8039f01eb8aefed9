use std::collections::{BTreeMap, HashMap};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Order, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Select, Set, sea_query::Expr,
};
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use crate::{
    db::{now_sec, paginate},
    dispatcher::Dispatcher,
    entities::{emotion, film, film_emotion_rating},
    error::{AppError, AppResult},
    models::{
        EmotionInput, EmotionOut, FilmBrowse, FilmDetail, FilmInput, FilmSummary, FilmView, Genre,
        MIN_INTENSITY, Page, ProfileEntry, RatingInput,
    },
    publish::PriorState,
    ratings,
    slugs::unique_emotion_slug,
    transaction::Transaction,
};

pub const API_PAGE_SIZE: u64 = 20;
pub const BROWSE_PAGE_SIZE: u64 = 12;
const SIMILAR_FILMS: u64 = 6;

/// Query string of `GET /api/films`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiFilmQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub country: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u64>,
}

/// Query string of `GET /films`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub emotions: Vec<i32>,
    pub page: Option<u64>,
}

/// Query string of the admin film list. Includes unpublished films.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdminFilmQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub is_published: Option<bool>,
    pub page: Option<u64>,
}

/// Films, emotions and their ratings. Film writes run inside a
/// [`Transaction`] and hand publish transitions to the [`Dispatcher`].
#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
    dispatcher: Dispatcher,
}

impl Catalog {
    pub fn new(db: DatabaseConnection, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    // ---- emotions ----

    pub async fn emotions(&self, search: Option<&str>) -> AppResult<Vec<emotion::Model>> {
        let mut select = emotion::Entity::find().filter(emotion::Column::IsActive.eq(true));
        for term in search_terms(search) {
            select = select.filter(
                Condition::any()
                    .add(emotion::Column::Name.contains(term))
                    .add(emotion::Column::Description.contains(term)),
            );
        }
        Ok(select.order_by_asc(emotion::Column::Name).all(&self.db).await?)
    }

    pub async fn emotion(&self, id: i32) -> AppResult<emotion::Model> {
        emotion::Entity::find_by_id(id)
            .filter(emotion::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("emotion {id}")))
    }

    pub async fn all_emotions(&self) -> AppResult<Vec<emotion::Model>> {
        Ok(emotion::Entity::find().order_by_asc(emotion::Column::Name).all(&self.db).await?)
    }

    pub async fn create_emotion(&self, input: EmotionInput) -> AppResult<emotion::Model> {
        input.validate()?;
        let name = input.name.trim();
        let slug = unique_emotion_slug(&self.db, name, input.slug.as_deref(), None).await?;

        let created = emotion::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug),
            description: Set(input.description),
            color: Set(input.color),
            icon: Set(input.icon),
            is_active: Set(input.is_active),
            created_at: Set(now_sec()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(emotion_id = created.id, slug = %created.slug, "emotion created");
        Ok(created)
    }

    /// A missing slug in `input` keeps the stored one.
    pub async fn update_emotion(&self, id: i32, input: EmotionInput) -> AppResult<emotion::Model> {
        input.validate()?;
        let existing = emotion::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("emotion {id}")))?;

        let name = input.name.trim();
        let requested = input.slug.as_deref().unwrap_or(&existing.slug);
        let slug = unique_emotion_slug(&self.db, name, Some(requested), Some(id)).await?;

        let mut model: emotion::ActiveModel = existing.into();
        model.name = Set(name.to_string());
        model.slug = Set(slug);
        model.description = Set(input.description);
        model.color = Set(input.color);
        model.icon = Set(input.icon);
        model.is_active = Set(input.is_active);
        Ok(model.update(&self.db).await?)
    }

    // ---- public film reads ----

    pub async fn api_films(&self, q: &ApiFilmQuery) -> AppResult<Page<FilmSummary>> {
        let mut select = published();
        if let Some(genre) = non_blank(q.genre.as_deref()) {
            select = select.filter(film::Column::Genre.eq(genre));
        }
        if let Some(year) = q.year {
            select = select.filter(film::Column::Year.eq(year));
        }
        if let Some(country) = non_blank(q.country.as_deref()) {
            select = select.filter(film::Column::Country.eq(country));
        }
        for term in search_terms(q.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(film::Column::Title.contains(term))
                    .add(film::Column::Description.contains(term))
                    .add(film::Column::Director.contains(term)),
            );
        }
        for (column, order) in film_ordering(q.ordering.as_deref()) {
            select = select.order_by(column, order);
        }
        let select = select.order_by_desc(film::Column::Id);

        Ok(paginate(&self.db, select, q.page, API_PAGE_SIZE).await?.map(FilmSummary::from))
    }

    pub async fn api_film(&self, id: i32) -> AppResult<FilmDetail> {
        let film = self.published_film(id).await?;
        detail(&self.db, film).await
    }

    /// Published films rated at least `min_intensity` for any of
    /// `emotion_ids`. An unparseable threshold counts as the minimum; no ids
    /// returns every published film.
    pub async fn films_by_emotion(
        &self,
        emotion_ids: &[i32],
        min_intensity: Option<&str>,
    ) -> AppResult<Vec<FilmDetail>> {
        let min_intensity =
            min_intensity.and_then(|s| s.trim().parse::<i32>().ok()).unwrap_or(MIN_INTENSITY);

        let mut select = published();
        if !emotion_ids.is_empty() {
            select = select.filter(
                film::Column::Id.in_subquery(
                    film_emotion_rating::Entity::find()
                        .select_only()
                        .column(film_emotion_rating::Column::FilmId)
                        .filter(film_emotion_rating::Column::EmotionId.is_in(emotion_ids.iter().copied()))
                        .filter(film_emotion_rating::Column::Intensity.gte(min_intensity))
                        .into_query(),
                ),
            );
        }

        let films = select
            .order_by_desc(film::Column::CreatedAt)
            .order_by_desc(film::Column::Id)
            .all(&self.db)
            .await?;
        debug!(emotions = ?emotion_ids, min_intensity, found = films.len(), "films by emotion");
        details(&self.db, films).await
    }

    pub async fn emotion_profile(&self, film_id: i32) -> AppResult<BTreeMap<String, ProfileEntry>> {
        let film = self.published_film(film_id).await?;
        Ok(ratings_of(&self.db, film.id)
            .await?
            .into_iter()
            .map(|(rating, emotion)| {
                (
                    emotion.name,
                    ProfileEntry { intensity: rating.intensity, color: emotion.color, icon: emotion.icon },
                )
            })
            .collect())
    }

    pub async fn browse_films(&self, q: &BrowseQuery) -> AppResult<FilmBrowse> {
        let mut select = published();
        if let Some(term) = non_blank(q.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(film::Column::Title.contains(term))
                    .add(film::Column::Description.contains(term)),
            );
        }
        if let Some(genre) = non_blank(q.genre.as_deref()) {
            select = select.filter(film::Column::Genre.eq(genre));
        }
        if let Some(year) = q.year {
            select = select.filter(film::Column::Year.eq(year));
        }
        if !q.emotions.is_empty() {
            select = select.filter(
                film::Column::Id.in_subquery(
                    film_emotion_rating::Entity::find()
                        .select_only()
                        .column(film_emotion_rating::Column::FilmId)
                        .filter(film_emotion_rating::Column::EmotionId.is_in(q.emotions.iter().copied()))
                        .into_query(),
                ),
            );
        }
        let select =
            select.order_by_desc(film::Column::CreatedAt).order_by_desc(film::Column::Id);

        let films = paginate(&self.db, select, q.page, BROWSE_PAGE_SIZE).await?.map(FilmSummary::from);
        let emotions = self.emotions(None).await?.into_iter().map(EmotionOut::from).collect();
        let genres = Genre::ALL.into_iter().map(Into::into).collect();
        Ok(FilmBrowse { films, emotions, genres })
    }

    /// The film page. Counts a view and lists other published films of the
    /// same genre.
    pub async fn view_film(&self, id: i32) -> AppResult<FilmView> {
        let res = film::Entity::update_many()
            .col_expr(film::Column::ViewsCount, Expr::col(film::Column::ViewsCount).add(1))
            .filter(film::Column::Id.eq(id))
            .filter(film::Column::IsPublished.eq(true))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::not_found(format!("film {id}")));
        }

        let film = self.published_film(id).await?;
        let similar_films = published()
            .filter(film::Column::Genre.eq(film.genre.as_str()))
            .filter(film::Column::Id.ne(id))
            .order_by_desc(film::Column::CreatedAt)
            .order_by_desc(film::Column::Id)
            .limit(SIMILAR_FILMS)
            .all(&self.db)
            .await?
            .into_iter()
            .map(FilmSummary::from)
            .collect();

        Ok(FilmView { film: detail(&self.db, film).await?, similar_films })
    }

    async fn published_film(&self, id: i32) -> AppResult<film::Model> {
        published()
            .filter(film::Column::Id.eq(id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("film {id}")))
    }

    // ---- admin ----

    pub async fn admin_films(&self, q: &AdminFilmQuery) -> AppResult<Page<FilmSummary>> {
        let mut select = film::Entity::find();
        for term in search_terms(q.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(film::Column::Title.contains(term))
                    .add(film::Column::Director.contains(term))
                    .add(film::Column::Description.contains(term))
                    .add(film::Column::Country.contains(term)),
            );
        }
        if let Some(genre) = non_blank(q.genre.as_deref()) {
            select = select.filter(film::Column::Genre.eq(genre));
        }
        if let Some(year) = q.year {
            select = select.filter(film::Column::Year.eq(year));
        }
        if let Some(is_published) = q.is_published {
            select = select.filter(film::Column::IsPublished.eq(is_published));
        }
        let select =
            select.order_by_desc(film::Column::CreatedAt).order_by_desc(film::Column::Id);
        Ok(paginate(&self.db, select, q.page, API_PAGE_SIZE).await?.map(FilmSummary::from))
    }

    pub async fn admin_film(&self, id: i32) -> AppResult<FilmDetail> {
        let film = find_film(&self.db, id).await?;
        detail(&self.db, film).await
    }

    /// Inserts the film and its initial ratings in one transaction.
    /// Subscribers are notified after commit when the film is created
    /// published.
    pub async fn create_film(&self, input: FilmInput, created_by: Option<i32>) -> AppResult<FilmDetail> {
        input.validate()?;
        let now = now_sec();

        let mut tx = Transaction::begin(&self.db).await?;
        let mut model = film::ActiveModel {
            rating: Set(0.0),
            views_count: Set(0),
            created_by: Set(created_by),
            created_at: Set(now),
            ..Default::default()
        };
        fill_film(&mut model, &input, now);
        let film = model.insert(tx.conn()).await?;

        apply_ratings(tx.conn(), film.id, &input.ratings, created_by).await?;
        self.queue_publish(&mut tx, PriorState::Absent, &film);
        tx.commit().await?;

        info!(film_id = film.id, title = %film.title, published = film.is_published, "film created");
        self.admin_film(film.id).await
    }

    /// Replaces the film's fields and upserts the given ratings. Ratings not
    /// listed are left as they are.
    pub async fn update_film(&self, id: i32, input: FilmInput, editor: Option<i32>) -> AppResult<FilmDetail> {
        input.validate()?;

        let mut tx = Transaction::begin(&self.db).await?;
        let existing = find_film(tx.conn(), id).await?;
        let prior = PriorState::of(Some(existing.is_published));

        let mut model: film::ActiveModel = existing.into();
        fill_film(&mut model, &input, now_sec());
        let film = model.update(tx.conn()).await?;

        apply_ratings(tx.conn(), film.id, &input.ratings, editor).await?;
        self.queue_publish(&mut tx, prior, &film);
        tx.commit().await?;

        info!(film_id = film.id, published = film.is_published, "film updated");
        self.admin_film(film.id).await
    }

    pub async fn set_film_rating(
        &self,
        film_id: i32,
        input: RatingInput,
        rated_by: Option<i32>,
    ) -> AppResult<FilmDetail> {
        input.validate()?;
        let tx = Transaction::begin(&self.db).await?;
        find_film(tx.conn(), film_id).await?;
        ratings::set_rating(tx.conn(), film_id, &input, rated_by).await?;
        tx.commit().await?;
        self.admin_film(film_id).await
    }

    pub async fn delete_film_rating(&self, film_id: i32, emotion_id: i32) -> AppResult<FilmDetail> {
        let tx = Transaction::begin(&self.db).await?;
        ratings::remove_rating(tx.conn(), film_id, emotion_id).await?;
        tx.commit().await?;
        self.admin_film(film_id).await
    }

    fn queue_publish(&self, tx: &mut Transaction, prior: PriorState, film: &film::Model) {
        if prior.just_published(film.is_published) {
            debug!(film_id = film.id, ?prior, "film published, notifying subscribers after commit");
            tx.on_commit(self.dispatcher.after_publish(film.id));
        }
    }
}

fn published() -> Select<film::Entity> {
    film::Entity::find().filter(film::Column::IsPublished.eq(true))
}

async fn find_film<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<film::Model> {
    film::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("film {id}")))
}

fn fill_film(model: &mut film::ActiveModel, input: &FilmInput, now: i64) {
    model.title = Set(input.title.trim().to_string());
    model.original_title = Set(input.original_title.trim().to_string());
    model.description = Set(input.description.clone());
    model.year = Set(input.year);
    model.duration = Set(input.duration);
    model.poster = Set(input.poster.clone().filter(|p| !p.trim().is_empty()));
    model.trailer_url = Set(input.trailer_url.clone());
    model.country = Set(input.country.trim().to_string());
    model.director = Set(input.director.trim().to_string());
    model.genre = Set(input.genre.as_code().to_string());
    model.is_published = Set(input.is_published);
    model.updated_at = Set(now);
}

async fn apply_ratings<C: ConnectionTrait>(
    conn: &C,
    film_id: i32,
    inputs: &[RatingInput],
    rated_by: Option<i32>,
) -> AppResult<()> {
    for input in inputs {
        ratings::set_rating(conn, film_id, input, rated_by).await?;
    }
    Ok(())
}

/// Ratings of one film, strongest first.
async fn ratings_of<C: ConnectionTrait>(
    conn: &C,
    film_id: i32,
) -> AppResult<Vec<(film_emotion_rating::Model, emotion::Model)>> {
    Ok(film_emotion_rating::Entity::find()
        .filter(film_emotion_rating::Column::FilmId.eq(film_id))
        .order_by_desc(film_emotion_rating::Column::Intensity)
        .order_by_asc(film_emotion_rating::Column::Id)
        .find_also_related(emotion::Entity)
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|(rating, emotion)| emotion.map(|e| (rating, e)))
        .collect())
}

async fn detail<C: ConnectionTrait>(conn: &C, film: film::Model) -> AppResult<FilmDetail> {
    let ratings = ratings_of(conn, film.id).await?;
    Ok(FilmDetail::new(film, ratings))
}

/// Full shapes for many films with one ratings query.
async fn details<C: ConnectionTrait>(conn: &C, films: Vec<film::Model>) -> AppResult<Vec<FilmDetail>> {
    if films.is_empty() {
        return Ok(Vec::new());
    }

    let rows = film_emotion_rating::Entity::find()
        .filter(film_emotion_rating::Column::FilmId.is_in(films.iter().map(|f| f.id)))
        .order_by_desc(film_emotion_rating::Column::Intensity)
        .order_by_asc(film_emotion_rating::Column::Id)
        .find_also_related(emotion::Entity)
        .all(conn)
        .await?;

    let mut by_film: HashMap<i32, Vec<_>> = HashMap::new();
    for (rating, emotion) in rows {
        if let Some(emotion) = emotion {
            by_film.entry(rating.film_id).or_default().push((rating, emotion));
        }
    }

    Ok(films
        .into_iter()
        .map(|f| {
            let ratings = by_film.remove(&f.id).unwrap_or_default();
            FilmDetail::new(f, ratings)
        })
        .collect())
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Whitespace-separated search terms; each one must match some field.
fn search_terms(search: Option<&str>) -> impl Iterator<Item = &str> {
    search.unwrap_or_default().split_whitespace()
}

/// Parses `year,-rating` style orderings. Unknown fields are ignored; when
/// nothing valid remains the newest films come first.
fn film_ordering(ordering: Option<&str>) -> Vec<(film::Column, Order)> {
    let parsed: Vec<_> = ordering
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter_map(|field| {
            let (name, order) = match field.strip_prefix('-') {
                Some(name) => (name, Order::Desc),
                None => (field, Order::Asc),
            };
            let column = match name {
                "year" => film::Column::Year,
                "rating" => film::Column::Rating,
                "views_count" => film::Column::ViewsCount,
                "created_at" => film::Column::CreatedAt,
                _ => return None,
            };
            Some((column, order))
        })
        .collect();

    if parsed.is_empty() { vec![(film::Column::CreatedAt, Order::Desc)] } else { parsed }
}
