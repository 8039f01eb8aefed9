use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    sea_query::OnConflict,
};
use tracing::debug;

use crate::{
    db::now_sec,
    entities::{emotion, film, film_emotion_rating},
    error::{AppError, AppResult},
    models::RatingInput,
};

/// Creates or replaces the (film, emotion) rating, then refreshes the film's
/// aggregate rating.
pub async fn set_rating<C: ConnectionTrait>(
    conn: &C,
    film_id: i32,
    input: &RatingInput,
    rated_by: Option<i32>,
) -> AppResult<film_emotion_rating::Model> {
    if emotion::Entity::find_by_id(input.emotion_id).one(conn).await?.is_none() {
        return Err(AppError::validation(format!("unknown emotion {}", input.emotion_id)));
    }

    let model = film_emotion_rating::ActiveModel {
        film_id: Set(film_id),
        emotion_id: Set(input.emotion_id),
        intensity: Set(input.intensity),
        description: Set(input.description.clone()),
        rated_by: Set(rated_by),
        created_at: Set(now_sec()),
        ..Default::default()
    };

    film_emotion_rating::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                film_emotion_rating::Column::FilmId,
                film_emotion_rating::Column::EmotionId,
            ])
            .update_columns([
                film_emotion_rating::Column::Intensity,
                film_emotion_rating::Column::Description,
                film_emotion_rating::Column::RatedBy,
            ])
            .to_owned(),
        )
        .exec(conn)
        .await?;

    refresh_film_rating(conn, film_id).await?;

    film_emotion_rating::Entity::find()
        .filter(film_emotion_rating::Column::FilmId.eq(film_id))
        .filter(film_emotion_rating::Column::EmotionId.eq(input.emotion_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("rating for film {film_id}")))
}

pub async fn remove_rating<C: ConnectionTrait>(
    conn: &C,
    film_id: i32,
    emotion_id: i32,
) -> AppResult<()> {
    let res = film_emotion_rating::Entity::delete_many()
        .filter(film_emotion_rating::Column::FilmId.eq(film_id))
        .filter(film_emotion_rating::Column::EmotionId.eq(emotion_id))
        .exec(conn)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found(format!("rating of emotion {emotion_id} for film {film_id}")));
    }
    refresh_film_rating(conn, film_id).await?;
    Ok(())
}

/// Stores round(mean(intensity), 1) on the film. A film without ratings
/// keeps whatever rating it had.
pub async fn refresh_film_rating<C: ConnectionTrait>(conn: &C, film_id: i32) -> AppResult<Option<f64>> {
    let intensities: Vec<i32> = film_emotion_rating::Entity::find()
        .select_only()
        .column(film_emotion_rating::Column::Intensity)
        .filter(film_emotion_rating::Column::FilmId.eq(film_id))
        .into_tuple()
        .all(conn)
        .await?;

    let Some(rating) = mean_rounded(&intensities) else {
        return Ok(None);
    };

    film::ActiveModel { id: Set(film_id), rating: Set(rating), ..Default::default() }
        .update(conn)
        .await?;
    debug!(film_id, rating, ratings = intensities.len(), "film rating refreshed");
    Ok(Some(rating))
}

/// Mean rounded to one decimal. Ties round on the binary value of the mean,
/// half to even, so 29/4 = 7.25 becomes 7.2 and 31/4 = 7.75 becomes 7.8.
pub fn mean_rounded(intensities: &[i32]) -> Option<f64> {
    if intensities.is_empty() {
        return None;
    }
    let sum: i64 = intensities.iter().map(|&i| i64::from(i)).sum();
    let mean = sum as f64 / intensities.len() as f64;
    Some(format!("{mean:.1}").parse().unwrap_or(mean))
}
