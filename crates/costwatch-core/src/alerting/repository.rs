//! Alert repository for storing and querying cost alerts and their notifications

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::PostgresPool;
use crate::error::Result;
use crate::models::{
    Alert, AlertInput, AlertType, NotificationRecord, NotificationWithAlert, ServiceScope,
};

/// Persistent store for alerts and notification records
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Active alerts in creation order
    async fn list_active_alerts(&self) -> Result<Vec<Alert>>;

    /// Append a notification record stamped with the store's clock
    async fn insert_notification_record(
        &self,
        alert_id: i64,
        triggered_amount: f64,
    ) -> Result<NotificationRecord>;

    /// Validate and persist a new alert, returning its id
    async fn create_alert(&self, input: AlertInput) -> Result<i64>;

    /// Every alert, newest first
    async fn list_alerts(&self) -> Result<Vec<Alert>>;

    /// Enable or disable an alert; `false` if it does not exist
    async fn set_alert_active(&self, id: i64, is_active: bool) -> Result<bool>;

    /// Most recent notifications with their alert, newest first
    async fn recent_notifications(&self, limit: i64) -> Result<Vec<NotificationWithAlert>>;
}

/// Postgres-backed [`AlertStore`]
#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    /// Create a new alert store
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, alert_name, threshold_amount, service_name, alert_type,
                   is_active, created_at, updated_at
            FROM cost_alerts
            WHERE is_active = true
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_notification_record(
        &self,
        alert_id: i64,
        triggered_amount: f64,
    ) -> Result<NotificationRecord> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO alert_notifications (alert_id, triggered_amount, triggered_at)
            VALUES ($1, $2, NOW())
            RETURNING id, alert_id, triggered_amount, triggered_at
            "#,
        )
        .bind(alert_id)
        .bind(triggered_amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn create_alert(&self, input: AlertInput) -> Result<i64> {
        input.validate()?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO cost_alerts (alert_name, threshold_amount, service_name, alert_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(input.threshold_amount)
        .bind(input.service_name.as_str())
        .bind(input.alert_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, alert_name, threshold_amount, service_name, alert_type,
                   is_active, created_at, updated_at
            FROM cost_alerts
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_alert_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE cost_alerts SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recent_notifications(&self, limit: i64) -> Result<Vec<NotificationWithAlert>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT n.id, n.alert_id, n.triggered_amount, n.triggered_at,
                   a.alert_name, a.service_name, a.threshold_amount, a.alert_type
            FROM alert_notifications n
            JOIN cost_alerts a ON a.id = n.alert_id
            ORDER BY n.triggered_at DESC, n.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    alert_name: String,
    threshold_amount: f64,
    service_name: Option<String>,
    alert_type: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Alert {
            id: row.id,
            name: row.alert_name,
            threshold_amount: row.threshold_amount,
            service_name: ServiceScope::parse(row.service_name.as_deref()),
            alert_type: AlertType::from_db(&row.alert_type),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    alert_id: i64,
    triggered_amount: f64,
    triggered_at: DateTime<Utc>,
}

impl From<RecordRow> for NotificationRecord {
    fn from(row: RecordRow) -> Self {
        NotificationRecord {
            id: row.id,
            alert_id: row.alert_id,
            triggered_amount: row.triggered_amount,
            triggered_at: row.triggered_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    alert_id: i64,
    triggered_amount: f64,
    triggered_at: DateTime<Utc>,
    alert_name: String,
    service_name: Option<String>,
    threshold_amount: f64,
    alert_type: String,
}

impl From<NotificationRow> for NotificationWithAlert {
    fn from(row: NotificationRow) -> Self {
        NotificationWithAlert {
            id: row.id,
            alert_id: row.alert_id,
            triggered_amount: row.triggered_amount,
            triggered_at: row.triggered_at,
            alert_name: row.alert_name,
            service_name: ServiceScope::parse(row.service_name.as_deref()),
            threshold_amount: row.threshold_amount,
            alert_type: AlertType::from_db(&row.alert_type),
        }
    }
}
