//! Shared services handed to every request handler.

use std::sync::Arc;

use log::{info, warn};
use mockable::{Clock, DefaultClock};
use sqlx::mysql::MySqlPoolOptions;

use crate::config::AppConfig;
use crate::identity::{
    memory::InMemoryIdentityStore, mysql::MySqlIdentityStore, AuthService, IdentityStore,
};
use crate::tracker::{memory::InMemoryTaskStore, mysql::MySqlTaskStore, TaskService, TaskStore};

#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService,
    pub auth: AuthService,
}

impl AppState {
    #[must_use]
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        identity_store: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: &AppConfig,
    ) -> Self {
        Self {
            tasks: TaskService::new(task_store, Arc::clone(&clock)),
            auth: AuthService::new(identity_store, clock, config.sessions),
        }
    }

    /// State backed by the in-memory stores.
    #[must_use]
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(DefaultClock),
            config,
        )
    }

    /// Connects to MySQL and applies migrations, or falls back to memory
    /// when no `DATABASE_URL` is configured.
    ///
    /// # Errors
    ///
    /// Returns the connection or migration error.
    pub async fn connect(config: &AppConfig) -> Result<Self, sqlx::Error> {
        let Some(database_url) = &config.database_url else {
            warn!("DATABASE_URL is not set, tasks and sessions are kept in memory");
            return Ok(Self::in_memory(config));
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Connected to MySQL, migrations applied");

        Ok(Self::new(
            Arc::new(MySqlTaskStore::new(pool.clone())),
            Arc::new(MySqlIdentityStore::new(pool)),
            Arc::new(DefaultClock),
            config,
        ))
    }
}
