//! Notification delivery for cost alerts

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::config::NotificationConfig;
use crate::error::{Error, Result};

/// Content of a cost alert notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAlertMessage {
    /// Name of the alert that fired
    pub alert_name: String,
    /// Service the alert watches
    pub service_name: String,
    /// Observed cost
    pub amount: f64,
    /// Configured threshold
    pub threshold: f64,
}

impl CostAlertMessage {
    /// Email subject line
    pub fn subject(&self) -> String {
        format!("Cost alert: {}", self.alert_name)
    }

    /// Plain-text email body
    pub fn body(&self) -> String {
        format!(
            "AWS cost alert \"{}\" was triggered.\n\n\
             Service:   {}\n\
             Current:   ${:.2}\n\
             Threshold: ${:.2}\n\n\
             Spend is ${:.2} over the threshold.",
            self.alert_name,
            self.service_name,
            self.amount,
            self.threshold,
            self.amount - self.threshold
        )
    }
}

/// Sends cost alert notifications
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Deliver one cost alert to `destination`
    async fn send_cost_alert(
        &self,
        destination: &str,
        message: &CostAlertMessage,
    ) -> std::result::Result<(), NotificationError>;
}

/// Notification errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    /// Destination is not a usable email address
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    /// Request never got a response
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider answered with a non-2xx status
    #[error("Email provider returned {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, if readable
        body: String,
    },

    /// Send did not finish in time
    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends email through a transactional email HTTP API
pub struct HttpEmailGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpEmailGateway {
    /// Create a gateway posting to `endpoint`
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
            from: from.into(),
        })
    }

    /// Build a gateway from configuration; `None` when no endpoint is set
    pub fn from_config(config: &NotificationConfig, timeout: Duration) -> Result<Option<Self>> {
        let Some(endpoint) = &config.endpoint else {
            return Ok(None);
        };

        let gateway = Self::new(endpoint.clone(), config.from.clone(), timeout)?;
        Ok(Some(match &config.api_key {
            Some(api_key) => gateway.with_api_key(api_key.clone()),
            None => gateway,
        }))
    }

    /// Authenticate requests with a bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl NotificationGateway for HttpEmailGateway {
    async fn send_cost_alert(
        &self,
        destination: &str,
        message: &CostAlertMessage,
    ) -> std::result::Result<(), NotificationError> {
        if !is_plausible_address(destination) {
            return Err(NotificationError::InvalidAddress(destination.to_string()));
        }

        let payload = EmailPayload {
            from: &self.from,
            to: destination,
            subject: message.subject(),
            text: message.body(),
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected { status, body });
        }

        info!(to = %destination, service = %message.service_name, "Cost alert email sent");
        Ok(())
    }
}

fn is_plausible_address(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> CostAlertMessage {
        CostAlertMessage {
            alert_name: "EC2 budget".to_string(),
            service_name: "EC2".to_string(),
            amount: 150.0,
            threshold: 100.0,
        }
    }

    #[test]
    fn body_names_service_amount_and_threshold() {
        let body = message().body();

        assert!(body.contains("EC2"));
        assert!(body.contains("$150.00"));
        assert!(body.contains("$100.00"));
        assert_eq!(message().subject(), "Cost alert: EC2 budget");
    }

    #[tokio::test]
    async fn posts_email_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "to": "ops@example.com",
                "from": "costwatch@example.com",
                "subject": "Cost alert: EC2 budget",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpEmailGateway::new(
            format!("{}/send", server.uri()),
            "costwatch@example.com",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_api_key("secret");

        gateway.send_cost_alert("ops@example.com", &message()).await.unwrap();
    }

    #[tokio::test]
    async fn provider_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad sender"))
            .mount(&server)
            .await;

        let gateway =
            HttpEmailGateway::new(server.uri(), "costwatch@example.com", Duration::from_secs(5))
                .unwrap();

        let err = gateway
            .send_cost_alert("ops@example.com", &message())
            .await
            .unwrap_err();

        match err {
            NotificationError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad sender");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_without_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gateway =
            HttpEmailGateway::new(server.uri(), "costwatch@example.com", Duration::from_secs(5))
                .unwrap();

        let err = gateway.send_cost_alert("not-an-address", &message()).await.unwrap_err();
        assert!(matches!(err, NotificationError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn configured_api_key_is_sent_as_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer from-config"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = NotificationConfig {
            endpoint: Some(server.uri()),
            api_key: Some("from-config".to_string()),
            ..NotificationConfig::default()
        };
        let gateway = HttpEmailGateway::from_config(&config, Duration::from_secs(5))
            .unwrap()
            .unwrap();

        gateway.send_cost_alert("ops@example.com", &message()).await.unwrap();
    }

    #[test]
    fn no_endpoint_means_no_gateway() {
        let config = NotificationConfig::default();
        assert!(HttpEmailGateway::from_config(&config, Duration::from_secs(1))
            .unwrap()
            .is_none());
    }
}
