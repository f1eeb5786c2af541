//! HTTP API server for the vox gateway

pub mod admin;
pub mod audio;
pub mod stream;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assistant::Assistant;
use crate::audio::{AudioSession, EnergyScorer, WakeWordDetector};
use crate::config::Config;
use crate::tools::ToolOrchestrator;
use crate::{Error, Result};

/// Shared state for API handlers
pub struct ApiState {
    pub config: Config,
    pub assistant: Arc<Assistant>,
    pub orchestrator: Arc<ToolOrchestrator>,
}

impl ApiState {
    /// Build a fresh audio session for one streaming connection
    ///
    /// # Errors
    ///
    /// Returns error if the session's frame normalizer cannot be built for
    /// the requested source rate.
    pub fn new_session(&self, source_rate: u32) -> Result<AudioSession> {
        let wake = WakeWordDetector::new(
            Box::new(EnergyScorer::default()),
            self.config.audio.wake_threshold,
        );
        AudioSession::with_source_rate(
            &self.config.audio,
            source_rate,
            wake,
            Arc::clone(&self.assistant) as Arc<dyn crate::audio::UtterancePipeline>,
        )
    }
}

/// Build the full application router
pub fn router(state: Arc<ApiState>) -> Router {
    let api = audio::router(Arc::clone(&state)).merge(admin::router(Arc::clone(&state)));

    Router::new()
        .merge(stream::router(state))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve the API until the process is stopped
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<ApiState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, "API server listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Transport(e.to_string()))
}

/// API handler errors, rendered as structured JSON
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        match error {
            Error::Config(message) => Self::Unavailable(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            Self::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
            }
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}
