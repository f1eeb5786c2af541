//! Synchronous audio and chat endpoints
//!
//! `/process-audio` runs the same pipeline as the streaming path with the
//! session machine collapsed to a single immediate processing step.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::audio::UtterancePipeline;
use crate::config::ConfigSummary;

use super::{ApiError, ApiState};

/// Build the audio/chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process-audio", post(process_audio))
        .route("/chat", post(chat))
        .route("/reset-conversation", post(reset_conversation))
        .route("/reload-knowledge", post(reload_knowledge))
        .route("/config", get(get_config))
        .with_state(state)
}

/// One-shot audio processing response
#[derive(Debug, Serialize)]
pub struct ProcessAudioResponse {
    pub transcription: String,
    pub response: String,
    pub retrieval_enabled: bool,
    pub tools_enabled: bool,
}

/// Transcribe an uploaded audio file and answer it in one round trip
async fn process_audio(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<ProcessAudioResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty audio data".to_string()));
    }
    tracing::info!(bytes = body.len(), "processing uploaded audio");

    let transcription = state
        .assistant
        .transcribe(body.to_vec())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let response = state
        .assistant
        .respond(&transcription)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ProcessAudioResponse {
        transcription,
        response,
        retrieval_enabled: state.assistant.retrieval_enabled(),
        tools_enabled: state.config.tools.enabled,
    }))
}

/// Direct chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Direct chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub retrieval_enabled: bool,
}

/// Answer a text message without audio
async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.text.is_empty() {
        return Err(ApiError::BadRequest("field 'text' is required".to_string()));
    }

    let response = state
        .assistant
        .respond(&request.text)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ChatResponse {
        response,
        retrieval_enabled: state.assistant.retrieval_enabled(),
    }))
}

/// Simple status acknowledgement
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Reset the conversation history
async fn reset_conversation(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    state.assistant.reset_conversation().await;
    Json(StatusResponse { status: "ok" })
}

/// Reload the document-context collaborator
async fn reload_knowledge(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.assistant.reload_knowledge().await?;
    Ok(Json(StatusResponse { status: "ok" }))
}

/// Current effective configuration
async fn get_config(State(state): State<Arc<ApiState>>) -> Json<ConfigSummary> {
    Json(state.config.summary())
}
