//! Alert data models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Stored value of [`ServiceScope::AnyService`]
pub const ANY_SERVICE: &str = "All Services";

/// Type of alert condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Fires when spend exceeds a fixed amount
    #[default]
    #[serde(alias = "threshold")]
    Absolute,
    /// Fires on relative change between periods (not evaluated)
    #[serde(alias = "percentage")]
    PercentageChange,
}

impl AlertType {
    /// Column value for this type
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absolute => "absolute",
            Self::PercentageChange => "percentage_change",
        }
    }

    /// Parse a column value; unknown values fall back to `Absolute`
    pub fn from_db(value: &str) -> Self {
        match value {
            "percentage_change" | "percentage" => Self::PercentageChange,
            _ => Self::Absolute,
        }
    }
}

/// Which cost entries an alert watches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceScope {
    /// A single service, matched by name
    Service(String),
    /// Total spend across every service
    AnyService,
}

impl ServiceScope {
    /// Interpret a user-supplied or stored service name
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim) else {
            return Self::AnyService;
        };

        if value.is_empty()
            || value == "*"
            || value.eq_ignore_ascii_case("all")
            || value.eq_ignore_ascii_case(ANY_SERVICE)
        {
            Self::AnyService
        } else {
            Self::Service(value.to_string())
        }
    }

    /// Column value for this scope
    pub fn as_str(&self) -> &str {
        match self {
            Self::Service(name) => name,
            Self::AnyService => ANY_SERVICE,
        }
    }
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServiceScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self::parse(value.as_deref()))
    }
}

/// A persisted cost threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier
    pub id: i64,

    /// Human-readable name
    pub name: String,

    /// Spend ceiling in the same currency as cost records
    pub threshold_amount: f64,

    /// Service being watched
    pub service_name: ServiceScope,

    /// Condition type
    pub alert_type: AlertType,

    /// Inactive alerts are kept but never evaluated
    pub is_active: bool,

    /// When the alert was created
    pub created_at: DateTime<Utc>,

    /// When the alert was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new alert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInput {
    /// Human-readable name; must not be blank
    #[serde(rename = "alertName", alias = "name")]
    pub name: String,
    /// Spend ceiling; must be positive
    pub threshold_amount: f64,
    /// Service to watch; all services when omitted
    #[serde(default = "any_service")]
    pub service_name: ServiceScope,
    /// Condition type; absolute when omitted
    #[serde(default)]
    pub alert_type: AlertType,
}

fn any_service() -> ServiceScope {
    ServiceScope::AnyService
}

impl AlertInput {
    /// Reject inputs that would break the alert invariants
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("alert name must not be empty"));
        }

        if !self.threshold_amount.is_finite() || self.threshold_amount <= 0.0 {
            return Err(Error::validation(format!(
                "threshold amount must be a positive number, got {}",
                self.threshold_amount
            )));
        }

        Ok(())
    }
}

/// Durable proof that an alert fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Unique identifier
    pub id: i64,

    /// The alert that fired
    pub alert_id: i64,

    /// Observed cost that caused the breach
    pub triggered_amount: f64,

    /// When the breach was recorded
    pub triggered_at: DateTime<Utc>,
}

/// A notification record joined with its alert, as listed by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationWithAlert {
    /// Notification record id
    pub id: i64,
    /// The alert that fired
    pub alert_id: i64,
    /// Observed cost that caused the breach
    pub triggered_amount: f64,
    /// When the breach was recorded
    pub triggered_at: DateTime<Utc>,
    /// Name of the alert
    pub alert_name: String,
    /// Service the alert watches
    pub service_name: ServiceScope,
    /// Threshold at the time of listing
    pub threshold_amount: f64,
    /// Condition type of the alert
    pub alert_type: AlertType,
}

/// An active alert whose threshold was exceeded in one evaluation cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    /// The alert that fired
    pub alert: Alert,
    /// Cost observed for the alert's scope
    pub observed_cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, ServiceScope::AnyService)]
    #[case(Some(""), ServiceScope::AnyService)]
    #[case(Some("*"), ServiceScope::AnyService)]
    #[case(Some("ALL"), ServiceScope::AnyService)]
    #[case(Some("All Services"), ServiceScope::AnyService)]
    #[case(Some(" EC2 "), ServiceScope::Service("EC2".to_string()))]
    fn parses_service_scope(#[case] raw: Option<&str>, #[case] expected: ServiceScope) {
        assert_eq!(ServiceScope::parse(raw), expected);
    }

    #[test]
    fn alert_input_accepts_api_field_names() {
        let input: AlertInput = serde_json::from_str(
            r#"{"alertName":"EC2 budget","thresholdAmount":100.5,"serviceName":"EC2","alertType":"absolute"}"#,
        )
        .unwrap();

        assert_eq!(input.name, "EC2 budget");
        assert_eq!(input.threshold_amount, 100.5);
        assert_eq!(input.service_name, ServiceScope::Service("EC2".to_string()));
        assert_eq!(input.alert_type, AlertType::Absolute);
    }

    #[test]
    fn alert_input_defaults_to_any_service() {
        let input: AlertInput =
            serde_json::from_str(r#"{"alertName":"Total","thresholdAmount":1000}"#).unwrap();

        assert_eq!(input.service_name, ServiceScope::AnyService);
        assert_eq!(input.alert_type, AlertType::Absolute);
    }

    #[rstest]
    #[case("", 10.0)]
    #[case("   ", 10.0)]
    #[case("budget", 0.0)]
    #[case("budget", -5.0)]
    #[case("budget", f64::NAN)]
    #[case("budget", f64::INFINITY)]
    fn rejects_invalid_input(#[case] name: &str, #[case] threshold: f64) {
        let input = AlertInput {
            name: name.to_string(),
            threshold_amount: threshold,
            service_name: ServiceScope::AnyService,
            alert_type: AlertType::Absolute,
        };

        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn unknown_alert_type_reads_as_absolute() {
        assert_eq!(AlertType::from_db("forecast"), AlertType::Absolute);
        assert_eq!(AlertType::from_db("percentage_change"), AlertType::PercentageChange);
    }
}
