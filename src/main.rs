mod accounts;
mod auth;
mod catalog;
mod config;
mod db;
mod dispatcher;
mod entities;
mod error;
mod inbox;
mod mailer;
mod matcher;
mod models;
mod publish;
mod ratings;
mod routes;
mod seed;
mod slugs;
#[cfg(test)]
mod test_support;
mod transaction;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    accounts::Accounts,
    catalog::Catalog,
    config::Config,
    dispatcher::{DispatchSettings, Dispatcher},
    inbox::Inbox,
    mailer::Mailer,
};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub accounts: Accounts,
    pub inbox: Inbox,
}

impl AppState {
    pub fn new(config: &Config, db: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        let dispatcher = Dispatcher::new(
            db.clone(),
            mailer,
            DispatchSettings {
                from_email: config.email.from_address.clone(),
                site_host: config.site_host.clone(),
            },
        );

        Self {
            catalog: Catalog::new(db.clone(), dispatcher),
            accounts: Accounts::new(db.clone(), config.session_ttl_days, config.bcrypt_cost),
            inbox: Inbox::new(db),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,moviemood=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    let db = db::connect_and_migrate(&config.database_url).await?;
    let mailer = mailer::from_config(&config.email)?;
    let state = Arc::new(AppState::new(&config, db, mailer));

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {},
        Some("load-initial-data") => {
            let report =
                seed::load_initial_data(&state.catalog, &state.accounts, config.admin.as_ref()).await?;
            println!(
                "emotions: {} created, {} updated; films: {} created, {} updated",
                report.emotions_created,
                report.emotions_updated,
                report.films_created,
                report.films_updated
            );
            return Ok(());
        },
        Some(other) => anyhow::bail!("unknown command {other}, expected serve or load-initial-data"),
    }

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, site_host = %config.site_host, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
