//! HTTP intake for enrichment notifications

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::enrichment::Connector;
use crate::models::{EnrichmentOutcome, EnrichmentRequest};

/// Application state shared across handlers
pub struct AppState {
    pub connector: Connector,
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Enrichment notifications
        .route("/api/v1/enrich", post(enrich))

        .with_state(state)
}

// ==================== Handlers ====================

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "cti-enrichment",
        "version": env!("CARGO_PKG_VERSION"),
        "connector": state.connector.provider_name(),
        "scope": state.connector.scope().to_string(),
    }))
}

async fn enrich(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnrichmentRequest>,
) -> Result<Json<EnrichmentOutcome>, (StatusCode, Json<Value>)> {
    req.validate().map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    state
        .connector
        .process_message(&req)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(entity_id = %req.entity_id, error = %format!("{:#}", e), "Enrichment failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": format!("{:#}", e) })),
            )
        })
}
