//! Breach dispatch: durable record first, then best-effort notification

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::models::{Breach, NotificationRecord};

use super::notifier::{CostAlertMessage, NotificationError, NotificationGateway};
use super::repository::AlertStore;

/// Default upper bound on one notification send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from dispatching one breach
///
/// Only `DurableWriteFailed` is ever returned by [`AlertDispatcher::dispatch`];
/// send failures are reported inside [`DispatchOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The notification record could not be written; the breach is lost
    #[error("Failed to record breach of alert {alert_id}: {source}")]
    DurableWriteFailed {
        /// Alert whose breach was lost
        alert_id: i64,
        /// Store error
        source: Error,
    },

    /// The notification could not be delivered; the record still exists
    #[error("Failed to send notification for alert {alert_id}: {source}")]
    NotificationSendFailed {
        /// Alert whose notification failed
        alert_id: i64,
        /// Gateway error or timeout
        source: NotificationError,
    },
}

/// What happened to the notification step
#[derive(Debug, Clone)]
pub enum NotificationStatus {
    /// Delivered to the gateway
    Sent,
    /// No notification target configured
    Skipped,
    /// Gateway error or timeout
    Failed(NotificationError),
}

/// Result of a dispatch whose breach was recorded
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Alert that fired
    pub alert_id: i64,
    /// The written notification record
    pub record: NotificationRecord,
    /// Outcome of the notification attempt
    pub notification: NotificationStatus,
}

impl DispatchOutcome {
    /// The non-fatal send failure, if any
    pub fn notification_error(&self) -> Option<DispatchError> {
        match &self.notification {
            NotificationStatus::Failed(source) => Some(DispatchError::NotificationSendFailed {
                alert_id: self.alert_id,
                source: source.clone(),
            }),
            _ => None,
        }
    }
}

struct NotificationTarget {
    gateway: Arc<dyn NotificationGateway>,
    recipient: String,
    timeout: Duration,
}

/// Records breaches and sends their notifications
pub struct AlertDispatcher {
    store: Arc<dyn AlertStore>,
    target: Option<NotificationTarget>,
}

impl AlertDispatcher {
    /// Create a dispatcher that only records breaches
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self {
            store,
            target: None,
        }
    }

    /// Also notify `recipient` through `gateway`, bounded by `timeout`
    pub fn with_notifications(
        mut self,
        gateway: Arc<dyn NotificationGateway>,
        recipient: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        self.target = Some(NotificationTarget {
            gateway,
            recipient: recipient.into(),
            timeout,
        });
        self
    }

    /// Whether a notification target is configured
    pub fn notifications_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Record one breach, then try to notify
    ///
    /// The record is written before any send is attempted and is never
    /// rolled back.
    pub async fn dispatch(&self, breach: &Breach) -> Result<DispatchOutcome, DispatchError> {
        let alert = &breach.alert;

        let record = self
            .store
            .insert_notification_record(alert.id, breach.observed_cost)
            .await
            .map_err(|source| {
                counter!("costwatch_durable_write_failures_total").increment(1);
                error!(alert_id = alert.id, error = %source, "Failed to record breach");
                DispatchError::DurableWriteFailed {
                    alert_id: alert.id,
                    source,
                }
            })?;

        counter!("costwatch_notification_records_total").increment(1);
        info!(
            alert_id = alert.id,
            record_id = record.id,
            service = %alert.service_name,
            observed_cost = breach.observed_cost,
            threshold = alert.threshold_amount,
            "Cost alert triggered"
        );

        let notification = match &self.target {
            Some(target) => self.notify(target, breach).await,
            None => NotificationStatus::Skipped,
        };

        Ok(DispatchOutcome {
            alert_id: alert.id,
            record,
            notification,
        })
    }

    async fn notify(&self, target: &NotificationTarget, breach: &Breach) -> NotificationStatus {
        let message = CostAlertMessage {
            alert_name: breach.alert.name.clone(),
            service_name: breach.alert.service_name.to_string(),
            amount: breach.observed_cost,
            threshold: breach.alert.threshold_amount,
        };

        let sent = tokio::time::timeout(
            target.timeout,
            target.gateway.send_cost_alert(&target.recipient, &message),
        )
        .await
        .unwrap_or(Err(NotificationError::Timeout(target.timeout)));

        match sent {
            Ok(()) => NotificationStatus::Sent,
            Err(e) => {
                counter!("costwatch_notification_failures_total").increment(1);
                warn!(
                    alert_id = breach.alert.id,
                    recipient = %target.recipient,
                    error = %e,
                    "Cost alert notification failed; breach remains recorded"
                );
                NotificationStatus::Failed(e)
            }
        }
    }
}
