//! Cost alerting
//!
//! Threshold evaluation of cost snapshots, durable breach records, and email
//! notification delivery.

mod dispatcher;
mod evaluator;
mod monitor;
mod notifier;
mod repository;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{
    AlertDispatcher, DispatchError, DispatchOutcome, NotificationStatus, DEFAULT_SEND_TIMEOUT,
};
pub use evaluator::{normalize_service_name, ServiceMatch, ThresholdEvaluator};
pub use monitor::{AlertMonitor, CycleReport};
pub use notifier::{CostAlertMessage, HttpEmailGateway, NotificationError, NotificationGateway};
pub use repository::{AlertStore, PgAlertStore};
pub use source::{CostSource, PgCostSource};
