//! WebSocket audio streaming endpoint
//!
//! Binary PCM chunks in, JSON status events out. Chunk handling is strictly
//! sequential within a connection: the next chunk is not read until the
//! session has finished reacting to the previous one, so transport
//! back-pressure bounds the pipeline naturally.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::audio::SessionEvent;

use super::ApiState;

/// Optional query parameters for the audio stream
#[derive(Debug, Deserialize)]
struct StreamQuery {
    /// Source sample rate of the inbound PCM; defaults to the configured rate
    rate: Option<u32>,
}

/// Build the streaming router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws/audio", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rate = query.rate.unwrap_or(state.config.audio.sample_rate);
    ws.on_upgrade(move |socket| handle_socket(socket, state, rate))
}

/// Drive one audio session over its socket
async fn handle_socket(mut socket: WebSocket, state: Arc<ApiState>, source_rate: u32) {
    let mut session = match state.new_session(source_rate) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "failed to create audio session");
            let event = SessionEvent::Error {
                message: e.to_string(),
            };
            let _ = send_event(&mut socket, &event).await;
            return;
        }
    };

    tracing::info!(session_id = %session.id(), source_rate, "audio client connected");
    if send_event(&mut socket, &SessionEvent::Ready).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Binary(chunk) => {
                let events = match session.handle_chunk(&chunk).await {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::error!(session_id = %session.id(), error = %e, "chunk handling failed");
                        break;
                    }
                };
                for event in events {
                    if send_event(&mut socket, &event).await.is_err() {
                        session.close();
                        return;
                    }
                }
            }
            Message::Close(_) => {
                tracing::info!(session_id = %session.id(), "client closed stream");
                break;
            }
            // axum answers pings automatically; text frames are ignored
            _ => {}
        }
    }

    session.close();
    tracing::info!(session_id = %session.id(), "audio client disconnected");
}

/// Serialize and send one event; an error means the socket is gone
async fn send_event(socket: &mut WebSocket, event: &SessionEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(text) => socket.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize session event");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_events_serialize_with_status_tag() {
        let event = SessionEvent::Transcribed {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"transcribed\""));
        assert!(json.contains("\"text\":\"hello\""));

        let ready = serde_json::to_string(&SessionEvent::Ready).unwrap();
        assert_eq!(ready, r#"{"status":"ready"}"#);

        let wake = serde_json::to_string(&SessionEvent::WakeWordDetected { confidence: 0.75 })
            .unwrap();
        assert!(wake.contains("\"status\":\"wake_word_detected\""));
    }
}
