//! Route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tollgate_identity::{ProfileResponse, ProviderConfig};
use tracing::{error, info};

use crate::app::AppState;
use crate::auth::CurrentIdentity;
use crate::error::ApiError;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

/// Body of `GET /v1/admin/ping`.
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: state.service_name().to_string(),
    })
}

/// Serves the public identity provider configuration.
pub async fn config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProviderConfig>, ApiError> {
    match state.provider_config().await {
        Ok(config) => Ok(Json(config.clone())),
        Err(report) => {
            error!(error = %report, "failed to load identity provider parameters");
            Err(ApiError::UpstreamConfig)
        }
    }
}

pub async fn profile(CurrentIdentity(identity): CurrentIdentity) -> Json<ProfileResponse> {
    Json(ProfileResponse::for_identity(identity))
}

pub async fn admin_ping(CurrentIdentity(identity): CurrentIdentity) -> Json<PingResponse> {
    info!(sub = %identity.sub, "admin ping");
    Json(PingResponse {
        status: "ok",
        message: format!("Admin access confirmed for {}", identity.sub),
        timestamp: Utc::now(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
