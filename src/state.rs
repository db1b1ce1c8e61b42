use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer};
use crate::rate_limit::RateLimiter;
use crate::store::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the log mailer.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let timeout = Duration::from_secs(config.db_timeout_secs);

        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(timeout)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let store = Arc::new(PgUserStore::new(db, timeout)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(config, store, Arc::new(LogMailer)))
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let login_limiter = Arc::new(RateLimiter::from_config(&config.login_rate_limit));
        Self {
            config: Arc::new(config),
            store,
            mailer,
            login_limiter,
        }
    }
}
