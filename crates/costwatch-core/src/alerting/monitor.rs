//! Evaluation cycles: load alerts, evaluate a snapshot, dispatch breaches

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::CostSnapshot;

use super::dispatcher::{AlertDispatcher, NotificationStatus};
use super::evaluator::{ServiceMatch, ThresholdEvaluator};
use super::notifier::HttpEmailGateway;
use super::repository::AlertStore;
use super::source::CostSource;

/// Summary of one evaluation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Active alerts loaded for the cycle
    pub alerts_evaluated: usize,
    /// Alerts whose threshold was exceeded
    pub breaches: usize,
    /// Alert ids whose breach was durably recorded, in alert order
    pub recorded: Vec<i64>,
    /// Notifications delivered
    pub notified: usize,
    /// Notifications that failed or timed out
    pub notification_failures: usize,
    /// Breaches lost because the record could not be written
    pub write_failures: usize,
}

/// Runs evaluation cycles one at a time
pub struct AlertMonitor {
    store: Arc<dyn AlertStore>,
    evaluator: ThresholdEvaluator,
    dispatcher: AlertDispatcher,
    cycle_lock: Mutex<()>,
}

impl AlertMonitor {
    /// Create a new monitor
    pub fn new(
        store: Arc<dyn AlertStore>,
        evaluator: ThresholdEvaluator,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            store,
            evaluator,
            dispatcher,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Wire a monitor from configuration
    ///
    /// Email is only sent when both an endpoint and a recipient are set.
    pub fn from_config(config: &Config, store: Arc<dyn AlertStore>) -> Result<Self> {
        let service_match = if config.alerting.normalize_service_names {
            ServiceMatch::Normalized
        } else {
            ServiceMatch::Exact
        };

        let timeout = config.alerting.send_timeout;
        let gateway = HttpEmailGateway::from_config(&config.notifications, timeout)?;

        let mut dispatcher = AlertDispatcher::new(store.clone());
        match (gateway, &config.notifications.recipient) {
            (Some(gateway), Some(recipient)) => {
                dispatcher = dispatcher.with_notifications(Arc::new(gateway), recipient.clone(), timeout);
            }
            _ => warn!("No notification target configured; breaches will only be recorded"),
        }

        Ok(Self::new(store, ThresholdEvaluator::new(service_match), dispatcher))
    }

    /// Whether breaches will be emailed
    pub fn notifications_enabled(&self) -> bool {
        self.dispatcher.notifications_enabled()
    }

    /// Evaluate `snapshot` against the currently active alerts
    ///
    /// Cycles are serialized: a call waits for any cycle already running.
    /// A malformed snapshot or failing to load alerts aborts the cycle;
    /// per-breach failures are counted in the report.
    pub async fn check_thresholds(&self, snapshot: &CostSnapshot) -> Result<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        let span = info_span!("evaluation_cycle", cycle_id = %Uuid::new_v4());

        async {
            counter!("costwatch_cycles_total").increment(1);

            snapshot.validate().map_err(|e| {
                error!(error = %e, "Rejecting cost snapshot; aborting cycle");
                e
            })?;

            let alerts = self.store.list_active_alerts().await.map_err(|e| {
                error!(error = %e, "Failed to load active alerts; aborting cycle");
                e
            })?;

            let breaches = self.evaluator.evaluate(&alerts, snapshot);
            counter!("costwatch_breaches_total").increment(breaches.len() as u64);

            let mut report = CycleReport {
                alerts_evaluated: alerts.len(),
                breaches: breaches.len(),
                ..CycleReport::default()
            };

            let results = join_all(breaches.iter().map(|b| self.dispatcher.dispatch(b))).await;

            for result in results {
                match result {
                    Ok(outcome) => {
                        report.recorded.push(outcome.alert_id);
                        match outcome.notification {
                            NotificationStatus::Sent => report.notified += 1,
                            NotificationStatus::Failed(_) => report.notification_failures += 1,
                            NotificationStatus::Skipped => {}
                        }
                    }
                    // Already logged by the dispatcher
                    Err(_) => report.write_failures += 1,
                }
            }

            info!(
                alerts = report.alerts_evaluated,
                services = snapshot.len(),
                breaches = report.breaches,
                recorded = report.recorded.len(),
                notified = report.notified,
                notification_failures = report.notification_failures,
                write_failures = report.write_failures,
                "Evaluation cycle complete"
            );

            Ok::<_, Error>(report)
        }
        .instrument(span)
        .await
    }

    /// Run a cycle every `every` until `shutdown` resolves
    ///
    /// A snapshot or cycle failure is logged and the next tick retries.
    /// A zero interval is refused and the monitor does not start.
    pub async fn run<F>(&self, source: &dyn CostSource, every: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if every.is_zero() {
            error!("Alert monitor interval must be greater than zero; not starting");
            return;
        }

        info!(interval = ?every, "Starting alert monitor");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let snapshot = match source.current_snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(error = %e, "Failed to load cost snapshot; skipping cycle");
                    continue;
                }
            };

            if let Err(e) = self.check_thresholds(&snapshot).await {
                error!(error = %e, "Evaluation cycle failed");
            }
        }

        info!("Alert monitor stopped");
    }
}
