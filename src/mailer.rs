use std::{num::NonZeroU32, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

use crate::{
    config::{EmailBackend, EmailConfig},
    error::{AppError, AppResult},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: String,
}

/// Delivers one plain-text message. Errors are returned, never retried.
pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, AppResult<()>>;
}

pub fn from_config(config: &EmailConfig) -> AppResult<Arc<dyn Mailer>> {
    match config.backend {
        EmailBackend::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
        EmailBackend::Console => {
            info!("email backend is console, messages will only be logged");
            Ok(Arc::new(ConsoleMailer))
        },
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let builder = if config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| AppError::Mail(e.to_string()))?;

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder
                .credentials(Credentials::new(config.username.clone(), config.password.clone()));
        }

        let rps = NonZeroU32::new(config.rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        debug!(host = %config.host, port = config.port, ssl = config.use_ssl, "smtp mailer configured");
        Ok(Self { transport: builder.build(), limiter })
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, AppResult<()>> {
        async move {
            let message = build_message(mail)?;
            self.limiter.until_ready().await;
            self.transport.send(message).await.map_err(|e| AppError::Mail(e.to_string()))?;
            debug!(to = %mail.to, subject = %mail.subject, "email sent");
            Ok(())
        }
        .boxed()
    }
}

fn build_message(mail: &OutgoingMail) -> AppResult<Message> {
    let from: Mailbox =
        mail.from.parse().map_err(|e| AppError::Mail(format!("sender {}: {e}", mail.from)))?;
    let to: Mailbox =
        mail.to.parse().map_err(|e| AppError::Mail(format!("recipient {}: {e}", mail.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| AppError::Mail(e.to_string()))
}

/// Logs messages instead of delivering them.
pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, AppResult<()>> {
        async move {
            info!(
                from = %mail.from,
                to = %mail.to,
                subject = %mail.subject,
                body = %mail.body,
                "email (console backend)"
            );
            Ok(())
        }
        .boxed()
    }
}
