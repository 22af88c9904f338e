//! Database layer for CostWatch

mod postgres;

pub use postgres::PostgresPool;

use crate::config::Config;
use crate::error::Result;

/// Connections used by the store and cost source
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
}

impl Database {
    /// Connect using the `database` section of `config`
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;
        Ok(Self { postgres })
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<()> {
        self.postgres.migrate().await
    }
}
