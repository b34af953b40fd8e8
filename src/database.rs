use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Пул соединений с Postgres и миграции схемы планетария.
#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| sqlx::Error::Configuration("DATABASE_URL is not set".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        info!(pool_size = config.pool_size, "Database pool ready");

        Ok(Database { pool })
    }

    /// Создаёт таблицы куполов, шоу, сеансов, билетов, броней и пользователей.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}
