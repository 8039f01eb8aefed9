use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmailBackend {
    Smtp,
    Console,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub backend: EmailBackend,
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub rps: u32,
}

#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub site_host: String,
    pub email: EmailConfig,
    pub session_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://moviemood.db?mode=rwc".to_string());

        // ALLOWED_HOSTS is a comma-separated list; links in emails use the first entry.
        let site_host = std::env::var("SITE_HOST")
            .ok()
            .or_else(|| {
                std::env::var("ALLOWED_HOSTS")
                    .ok()
                    .and_then(|hosts| hosts.split(',').next().map(|h| h.trim().to_string()))
            })
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());

        let backend = match std::env::var("EMAIL_BACKEND")
            .unwrap_or_else(|_| "console".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "smtp" => EmailBackend::Smtp,
            "console" => EmailBackend::Console,
            other => anyhow::bail!("EMAIL_BACKEND must be smtp or console, got {other}"),
        };

        let email_host =
            std::env::var("EMAIL_HOST").unwrap_or_else(|_| "smtp.yandex.com".to_string());
        let email_port: u16 = std::env::var("EMAIL_PORT")
            .unwrap_or_else(|_| "465".to_string())
            .parse()
            .context("EMAIL_PORT")?;
        let use_ssl = std::env::var("EMAIL_USE_SSL")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);
        let email_user = std::env::var("EMAIL_HOST_USER").unwrap_or_default();
        let email_password = std::env::var("EMAIL_HOST_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("DEFAULT_FROM_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                if email_user.is_empty() {
                    "webmaster@localhost".to_string()
                } else {
                    email_user.clone()
                }
            });
        let email_rps: u32 =
            std::env::var("EMAIL_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        let session_ttl_days: i64 =
            std::env::var("SESSION_TTL_DAYS").ok().and_then(|s| s.parse().ok()).unwrap_or(14);

        let bcrypt_cost: u32 =
            std::env::var("BCRYPT_COST").ok().and_then(|s| s.parse().ok()).unwrap_or(12);

        let admin = match (
            std::env::var("ADMIN_USERNAME"),
            std::env::var("ADMIN_PASSWORD"),
            std::env::var("ADMIN_EMAIL"),
        ) {
            (Ok(username), Ok(password), Ok(email)) => {
                Some(AdminSeed { username, password, email })
            },
            _ => None,
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            site_host,
            email: EmailConfig {
                backend,
                host: email_host,
                port: email_port,
                use_ssl,
                username: email_user,
                password: email_password,
                from_address,
                rps: email_rps,
            },
            session_ttl_days,
            bcrypt_cost,
            admin,
        })
    }
}
