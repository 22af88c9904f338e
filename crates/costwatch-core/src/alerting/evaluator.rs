//! Threshold evaluation of cost alerts against a cost snapshot

use tracing::debug;

use crate::models::{Alert, AlertType, Breach, CostSnapshot, ServiceScope};

/// How alert service names are compared to cost entry service names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceMatch {
    /// Byte-for-byte comparison
    #[default]
    Exact,
    /// Compare after [`normalize_service_name`]
    Normalized,
}

impl ServiceMatch {
    /// Whether `candidate` names the same service as `wanted`
    pub fn matches(self, wanted: &str, candidate: &str) -> bool {
        match self {
            Self::Exact => wanted == candidate,
            Self::Normalized => normalize_service_name(wanted) == normalize_service_name(candidate),
        }
    }
}

const VENDOR_PREFIXES: [&str; 2] = ["amazon ", "aws "];

/// Canonical form of an AWS service name
///
/// Lowercases, collapses whitespace, drops a leading `Amazon`/`AWS` and a
/// trailing ` - <qualifier>` (Cost Explorer reports
/// `Amazon Elastic Compute Cloud - Compute`).
pub fn normalize_service_name(name: &str) -> String {
    let mut normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if let Some(idx) = normalized.find(" - ") {
        normalized.truncate(idx);
    }

    for prefix in VENDOR_PREFIXES {
        if let Some(rest) = normalized.strip_prefix(prefix) {
            normalized = rest.to_string();
            break;
        }
    }

    normalized
}

/// Decides which active alerts a cost snapshot breaches
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEvaluator {
    service_match: ServiceMatch,
}

impl ThresholdEvaluator {
    /// Create an evaluator with the given service matching mode
    pub fn new(service_match: ServiceMatch) -> Self {
        Self { service_match }
    }

    /// Service matching mode in use
    pub fn service_match(&self) -> ServiceMatch {
        self.service_match
    }

    /// Cost the snapshot reports for an alert's scope
    ///
    /// A service with no entry costs zero.
    pub fn observed_cost(&self, alert: &Alert, snapshot: &CostSnapshot) -> f64 {
        match &alert.service_name {
            ServiceScope::AnyService => snapshot.total(),
            ServiceScope::Service(name) => snapshot
                .find_cost(|service| self.service_match.matches(name, service))
                .unwrap_or(0.0),
        }
    }

    /// Breaches in input alert order
    pub fn evaluate(&self, alerts: &[Alert], snapshot: &CostSnapshot) -> Vec<Breach> {
        alerts
            .iter()
            .filter_map(|alert| self.check(alert, snapshot))
            .collect()
    }

    /// Evaluate a single alert
    pub fn check(&self, alert: &Alert, snapshot: &CostSnapshot) -> Option<Breach> {
        if !alert.is_active {
            return None;
        }

        if alert.alert_type != AlertType::Absolute {
            debug!(
                alert_id = alert.id,
                alert_type = alert.alert_type.as_str(),
                "Skipping non-absolute alert"
            );
            return None;
        }

        let observed_cost = self.observed_cost(alert, snapshot);
        let breached = observed_cost > alert.threshold_amount;

        debug!(
            alert_id = alert.id,
            service = %alert.service_name,
            observed_cost,
            threshold = alert.threshold_amount,
            breached,
            "Evaluated alert"
        );

        breached.then(|| Breach {
            alert: alert.clone(),
            observed_cost,
        })
    }
}
