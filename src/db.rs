use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, ItemsAndPagesNumber,
    PaginatorTrait, Select, Statement,
};

use crate::{error::AppResult, models::Page};

const PRAGMAS: [&str; 3] =
    ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL", "PRAGMA cache_size=-64000"];

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.sqlx_logging(false);

    // Every pooled connection to an in-memory database would see its own empty schema.
    let in_memory = is_in_memory(database_url);
    if in_memory {
        opts.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opts).await?;

    if !in_memory {
        for pragma in PRAGMAS {
            db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string()))
                .await?;
        }
    }

    Migrator::up(&db, None).await?;
    tracing::debug!(database_url = %database_url, "database ready");
    Ok(db)
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Fetches one page of `select`. Out-of-range page numbers are clamped to
/// the first or last page.
pub async fn paginate<C, E>(
    conn: &C,
    select: Select<E>,
    page: Option<u64>,
    per_page: u64,
) -> AppResult<Page<E::Model>>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
{
    let paginator = select.paginate(conn, per_page);
    let ItemsAndPagesNumber { number_of_items, number_of_pages } =
        paginator.num_items_and_pages().await?;

    let num_pages = number_of_pages.max(1);
    let page = page.unwrap_or(1).clamp(1, num_pages);
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Page { items, page, num_pages, total: number_of_items })
}

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
