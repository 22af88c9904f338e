//! # CostWatch
//!
//! Cost alerting for AWS spend.
//!
//! Persisted alert definitions are evaluated against a snapshot of current
//! per-service costs. Every breach is durably recorded before a best-effort
//! email notification is attempted, so a failed send never loses a breach.
//!
//! ## Architecture
//!
//! - **Alerting**: threshold evaluator, breach dispatcher, and the monitor
//!   that runs evaluation cycles
//! - **Storage**: PostgreSQL for alerts, notification records and cost data
//! - **API**: REST API for alert management and the notification feed
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply migrations, then serve the API and the periodic monitor
//! costwatch db migrate
//! costwatch serve
//!
//! # Run one evaluation cycle against a snapshot file
//! costwatch check --snapshot costs.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{
        AlertDispatcher, AlertMonitor, AlertStore, CycleReport, ThresholdEvaluator,
    };
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
