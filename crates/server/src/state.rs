//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::email::EmailService;
use crate::services::payments::PaymentService;
use crate::services::tokens::TokenService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; gives handlers access to the pool,
/// configuration, token signing, payment gateways, and the mailer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    tokens: TokenService,
    payments: PaymentService,
    mailer: Option<EmailService>,
}

impl AppState {
    /// Create the application state.
    ///
    /// The mailer is `None` when SMTP is not configured; email side
    /// effects are skipped in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(
        config: ServerConfig,
        pool: PgPool,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let tokens = TokenService::new(&config.jwt);
        let payments = PaymentService::new(&config);
        let mailer = match &config.smtp {
            Some(smtp) => Some(EmailService::new(smtp)?),
            None => None,
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                payments,
                mailer,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the payment gateway dispatcher.
    #[must_use]
    pub fn payments(&self) -> &PaymentService {
        &self.inner.payments
    }

    /// Get the mailer, if SMTP is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&EmailService> {
        self.inner.mailer.as_ref()
    }
}
