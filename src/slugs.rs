use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::debug;

use crate::{entities::emotion, error::AppResult};

const FALLBACK_SLUG: &str = "emotion";

/// Picks the slug an emotion is saved under.
///
/// A blank `requested` slug is derived from `name`. The candidate is then
/// checked against every other emotion (`own_id` excluded) and suffixed with
/// `-1`, `-2`, ... until it is free.
pub async fn unique_emotion_slug<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    requested: Option<&str>,
    own_id: Option<i32>,
) -> AppResult<String> {
    let base = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => slug::slugify(name),
    };
    let base = if base.is_empty() { FALLBACK_SLUG.to_string() } else { base };

    let mut candidate = base.clone();
    let mut counter = 1;
    while slug_taken(conn, &candidate, own_id).await? {
        candidate = format!("{base}-{counter}");
        counter += 1;
    }

    if candidate != base {
        debug!(base = %base, slug = %candidate, "emotion slug disambiguated");
    }
    Ok(candidate)
}

async fn slug_taken<C: ConnectionTrait>(conn: &C, slug: &str, own_id: Option<i32>) -> AppResult<bool> {
    let mut query = emotion::Entity::find().filter(emotion::Column::Slug.eq(slug));
    if let Some(id) = own_id {
        query = query.filter(emotion::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}
