use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = pool_options(config).connect(&config.database_url).await?;
        tracing::debug!(max_connections = config.db_max_connections, "postgres pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn pool_options(config: &AppConfig) -> PgPoolOptions {
    let secs = Duration::from_secs;
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(secs(config.db_connect_timeout_seconds))
        .idle_timeout(secs(config.db_idle_timeout_seconds))
        .max_lifetime(secs(config.db_max_lifetime_seconds))
}

/// True when `err` is a Postgres unique violation on `constraint`.
pub fn is_unique_violation(err: &anyhow::Error, constraint: &str) -> bool {
    let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() else {
        return false;
    };
    let Some(db_err) = sqlx_err.as_database_error() else {
        return false;
    };
    db_err.code().as_deref() == Some("23505")
        && db_err.constraint().unwrap_or_default() == constraint
}
