//! Cost snapshot sources

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::PostgresPool;
use crate::error::Result;
use crate::models::{CostEntry, CostSnapshot};

/// Produces the current per-service spend
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Latest known spend per service
    async fn current_snapshot(&self) -> Result<CostSnapshot>;
}

/// Month-to-date spend from the `cost_records` table filled by cost ingestion
#[derive(Clone)]
pub struct PgCostSource {
    pool: PgPool,
}

impl PgCostSource {
    /// Create a new cost source
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }
}

#[async_trait]
impl CostSource for PgCostSource {
    async fn current_snapshot(&self) -> Result<CostSnapshot> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            r#"
            SELECT service_name, COALESCE(SUM(cost), 0)::DOUBLE PRECISION
            FROM cost_records
            WHERE usage_date >= date_trunc('month', CURRENT_DATE)
            GROUP BY service_name
            ORDER BY service_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(service, cost)| CostEntry { service, cost })
            .collect())
    }
}
