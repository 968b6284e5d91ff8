use std::{ops::Deref, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

/// Settings for the Postgres connection pool.
pub struct PoolOptions<'a> {
    pub url: &'a str,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Handle to the Postgres database backing the repositories.
#[derive(Clone)]
pub struct PostgresConnection(PgPool);

impl PostgresConnection {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }

    pub async fn connect(opts: PoolOptions<'_>) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(opts.acquire_timeout)
            .connect(opts.url)
            .await?;

        info!(max_connections = opts.max_connections, "Connected to database.");

        Ok(Self(pool))
    }
}

impl Deref for PostgresConnection {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
