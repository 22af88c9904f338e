//! API routes

use axum::{
    routing::{get, patch},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))

        // Alerts
        .route(
            "/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route("/alerts/notifications", get(handlers::list_notifications))
        .route("/alerts/:alert_id", patch(handlers::update_alert))

        .with_state(state)
}
