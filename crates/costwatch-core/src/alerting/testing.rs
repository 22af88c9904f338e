//! In-memory store and gateway used by unit tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertInput, AlertType, NotificationRecord, NotificationWithAlert, ServiceScope,
};

use super::notifier::{CostAlertMessage, NotificationError, NotificationGateway};
use super::repository::AlertStore;

/// Active absolute-threshold alert
pub fn alert(id: i64, service: &str, threshold: f64) -> Alert {
    let now = Utc::now();
    Alert {
        id,
        name: format!("{service} budget"),
        threshold_amount: threshold,
        service_name: ServiceScope::parse(Some(service)),
        alert_type: AlertType::Absolute,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn offline() -> Error {
    Error::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
struct StoreState {
    alerts: Vec<Alert>,
    records: Vec<(i64, i64, f64)>,
    failing_inserts: HashSet<i64>,
    offline: bool,
}

/// [`AlertStore`] backed by vectors
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    list_delay: Option<Duration>,
    lists_in_flight: AtomicUsize,
    max_lists_in_flight: AtomicUsize,
}

impl FakeStore {
    pub fn with_alerts(alerts: Vec<Alert>) -> Self {
        let store = Self::default();
        store.state.lock().alerts = alerts;
        store
    }

    /// Hold each `list_active_alerts` call open for `delay`
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// `(alert_id, triggered_amount)` in insertion order
    pub fn records(&self) -> Vec<(i64, f64)> {
        self.state
            .lock()
            .records
            .iter()
            .map(|(_, alert_id, amount)| (*alert_id, *amount))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn fail_inserts_for(&self, alert_id: i64) {
        self.state.lock().failing_inserts.insert(alert_id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn set_active(&self, alert_id: i64, active: bool) {
        for alert in &mut self.state.lock().alerts {
            if alert.id == alert_id {
                alert.is_active = active;
            }
        }
    }

    pub fn max_concurrent_lists(&self) -> usize {
        self.max_lists_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertStore for FakeStore {
    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        if self.state.lock().offline {
            return Err(offline());
        }

        let in_flight = self.lists_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_lists_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.lists_in_flight.fetch_sub(1, Ordering::SeqCst);

        let state = self.state.lock();
        let mut alerts: Vec<Alert> = state.alerts.iter().filter(|a| a.is_active).cloned().collect();
        alerts.sort_by_key(|a| a.id);
        Ok(alerts)
    }

    async fn insert_notification_record(
        &self,
        alert_id: i64,
        triggered_amount: f64,
    ) -> Result<NotificationRecord> {
        let mut state = self.state.lock();
        if state.offline || state.failing_inserts.contains(&alert_id) {
            return Err(offline());
        }

        let id = state.records.len() as i64 + 1;
        state.records.push((id, alert_id, triggered_amount));
        Ok(NotificationRecord {
            id,
            alert_id,
            triggered_amount,
            triggered_at: Utc::now(),
        })
    }

    async fn create_alert(&self, input: AlertInput) -> Result<i64> {
        input.validate()?;

        let mut state = self.state.lock();
        if state.offline {
            return Err(offline());
        }

        let id = state.alerts.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        state.alerts.push(Alert {
            id,
            name: input.name.trim().to_string(),
            threshold_amount: input.threshold_amount,
            service_name: input.service_name,
            alert_type: input.alert_type,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        let state = self.state.lock();
        if state.offline {
            return Err(offline());
        }

        let mut alerts = state.alerts.clone();
        alerts.sort_by_key(|a| std::cmp::Reverse(a.id));
        Ok(alerts)
    }

    async fn set_alert_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(offline());
        }

        match state.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.is_active = is_active;
                alert.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn recent_notifications(&self, limit: i64) -> Result<Vec<NotificationWithAlert>> {
        let state = self.state.lock();
        if state.offline {
            return Err(offline());
        }

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .records
            .iter()
            .rev()
            .filter_map(|(id, alert_id, amount)| {
                let alert = state.alerts.iter().find(|a| a.id == *alert_id)?;
                Some(NotificationWithAlert {
                    id: *id,
                    alert_id: *alert_id,
                    triggered_amount: *amount,
                    triggered_at: Utc::now(),
                    alert_name: alert.name.clone(),
                    service_name: alert.service_name.clone(),
                    threshold_amount: alert.threshold_amount,
                    alert_type: alert.alert_type,
                })
            })
            .take(limit)
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum GatewayBehavior {
    Succeed,
    Fail,
    Hang,
}

/// [`NotificationGateway`] that remembers what it was asked to send
pub struct FakeGateway {
    behavior: GatewayBehavior,
    sent: Mutex<Vec<(String, CostAlertMessage)>>,
    store: Option<Arc<FakeStore>>,
    records_seen: Mutex<Vec<usize>>,
}

impl FakeGateway {
    pub fn new(behavior: GatewayBehavior) -> Self {
        Self {
            behavior,
            sent: Mutex::new(Vec::new()),
            store: None,
            records_seen: Mutex::new(Vec::new()),
        }
    }

    /// Note the store's record count each time a send starts
    pub fn observing(mut self, store: Arc<FakeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sent(&self) -> Vec<(String, CostAlertMessage)> {
        self.sent.lock().clone()
    }

    pub fn records_seen_at_send(&self) -> Vec<usize> {
        self.records_seen.lock().clone()
    }
}

#[async_trait]
impl NotificationGateway for FakeGateway {
    async fn send_cost_alert(
        &self,
        destination: &str,
        message: &CostAlertMessage,
    ) -> std::result::Result<(), NotificationError> {
        if let Some(store) = &self.store {
            self.records_seen.lock().push(store.record_count());
        }

        match self.behavior {
            GatewayBehavior::Succeed => {
                self.sent
                    .lock()
                    .push((destination.to_string(), message.clone()));
                Ok(())
            }
            GatewayBehavior::Fail => Err(NotificationError::Http("connection reset".to_string())),
            GatewayBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}
