//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::alerting::AlertStore;
use crate::error::Error;
use crate::models::{Alert, AlertInput, NotificationWithAlert};

/// Maximum number of notifications returned by the notifications feed
pub const NOTIFICATIONS_PAGE_SIZE: i64 = 50;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Alert and notification store
    pub store: Arc<dyn AlertStore>,
    /// Prometheus handle; `/metrics` is 404 without it
    pub metrics: Option<PrometheusHandle>,
}

type ApiError = (StatusCode, String);

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }

    (status, err.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Alert creation response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertResponse {
    /// Always `true`
    pub success: bool,
    /// Id of the new alert
    pub alert_id: i64,
}

/// Create a cost alert
pub async fn create_alert(
    State(state): State<AppState>,
    Json(input): Json<AlertInput>,
) -> Result<Json<CreateAlertResponse>, ApiError> {
    let name = input.name.clone();
    let alert_id = state.store.create_alert(input).await.map_err(api_error)?;

    info!(alert_id, name = %name, "Cost alert created");

    Ok(Json(CreateAlertResponse {
        success: true,
        alert_id,
    }))
}

/// List alerts response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListAlertsResponse {
    /// Alerts, newest first
    pub alerts: Vec<Alert>,
    /// Number of alerts returned
    pub total: usize,
}

/// List every alert, newest first
pub async fn list_alerts(
    State(state): State<AppState>,
) -> Result<Json<ListAlertsResponse>, ApiError> {
    let alerts = state.store.list_alerts().await.map_err(api_error)?;
    let total = alerts.len();

    Ok(Json(ListAlertsResponse { alerts, total }))
}

/// Alert update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    /// New active state
    pub is_active: bool,
}

/// Alert update response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertResponse {
    /// Always `true`
    pub success: bool,
    /// Updated alert
    pub alert_id: i64,
    /// Active state after the update
    pub is_active: bool,
}

/// Enable or disable an alert
pub async fn update_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<i64>,
    Json(req): Json<UpdateAlertRequest>,
) -> Result<Json<UpdateAlertResponse>, ApiError> {
    let updated = state
        .store
        .set_alert_active(alert_id, req.is_active)
        .await
        .map_err(api_error)?;

    if !updated {
        return Err(api_error(Error::alert_not_found(alert_id)));
    }

    info!(alert_id, is_active = req.is_active, "Cost alert updated");

    Ok(Json(UpdateAlertResponse {
        success: true,
        alert_id,
        is_active: req.is_active,
    }))
}

/// Notifications feed response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListNotificationsResponse {
    /// Fired alerts, newest first
    pub notifications: Vec<NotificationWithAlert>,
    /// Number of notifications returned
    pub total: usize,
}

/// Most recent fired alerts, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<ListNotificationsResponse>, ApiError> {
    let notifications = state
        .store
        .recent_notifications(NOTIFICATIONS_PAGE_SIZE)
        .await
        .map_err(api_error)?;
    let total = notifications.len();

    Ok(Json(ListNotificationsResponse {
        notifications,
        total,
    }))
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or((StatusCode::NOT_FOUND, "Metrics recorder not installed".to_string()))
}
