//! Provider administration endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::tools::ProviderStatus;
use crate::Error;

use super::{ApiError, ApiState};

/// Build the provider admin router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/providers", get(list_providers))
        .route("/providers/{key}/start", post(start_provider))
        .route("/providers/{key}/stop", post(stop_provider))
        .route("/providers/{key}/enable", post(enable_provider))
        .route("/providers/{key}/disable", post(disable_provider))
        .with_state(state)
}

/// Providers and the aggregate tool catalog size
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderStatus>,
    pub catalog_size: usize,
}

/// Provider operation acknowledgement
#[derive(Debug, Serialize)]
pub struct ProviderActionResponse {
    pub status: &'static str,
    pub message: String,
}

/// List every registered provider with its runtime status
async fn list_providers(State(state): State<Arc<ApiState>>) -> Json<ProvidersResponse> {
    let providers = state.orchestrator.status().await;
    let catalog_size = state.orchestrator.catalog().await.len();
    Json(ProvidersResponse {
        providers,
        catalog_size,
    })
}

/// Start one provider
async fn start_provider(
    State(state): State<Arc<ApiState>>,
    Path(key): Path<String>,
) -> Result<Json<ProviderActionResponse>, ApiError> {
    match state.orchestrator.start(&key).await {
        Ok(true) => Ok(Json(ProviderActionResponse {
            status: "ok",
            message: format!("provider {key} started"),
        })),
        Ok(false) => Err(ApiError::BadRequest(format!("provider {key} is disabled"))),
        Err(e) => Err(map_provider_error(&key, e)),
    }
}

/// Stop one provider
async fn stop_provider(
    State(state): State<Arc<ApiState>>,
    Path(key): Path<String>,
) -> Result<Json<ProviderActionResponse>, ApiError> {
    state
        .orchestrator
        .stop(&key)
        .await
        .map_err(|e| map_provider_error(&key, e))?;
    Ok(Json(ProviderActionResponse {
        status: "ok",
        message: format!("provider {key} stopped"),
    }))
}

/// Administratively enable one provider
async fn enable_provider(
    State(state): State<Arc<ApiState>>,
    Path(key): Path<String>,
) -> Result<Json<ProviderActionResponse>, ApiError> {
    state
        .orchestrator
        .enable(&key)
        .await
        .map_err(|e| map_provider_error(&key, e))?;
    Ok(Json(ProviderActionResponse {
        status: "ok",
        message: format!("provider {key} enabled"),
    }))
}

/// Administratively disable one provider
async fn disable_provider(
    State(state): State<Arc<ApiState>>,
    Path(key): Path<String>,
) -> Result<Json<ProviderActionResponse>, ApiError> {
    state
        .orchestrator
        .disable(&key)
        .await
        .map_err(|e| map_provider_error(&key, e))?;
    Ok(Json(ProviderActionResponse {
        status: "ok",
        message: format!("provider {key} disabled"),
    }))
}

/// Unknown keys are 404s; everything else is an internal failure
fn map_provider_error(key: &str, error: Error) -> ApiError {
    match error {
        Error::Config(_) => ApiError::NotFound(format!("unknown provider {key}")),
        other => ApiError::Internal(other.to_string()),
    }
}
