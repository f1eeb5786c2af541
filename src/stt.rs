//! Speech-to-text collaborator

use async_trait::async_trait;

use crate::{Error, Result};

/// Transcription collaborator for assembled utterances
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio (any container the backend accepts) to text
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech via an OpenAI-compatible transcriptions endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl SpeechToText {
    /// Create a new STT instance
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: Option<String>, api_base: String, model: String) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("API key required for transcription".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_config_error() {
        assert!(SpeechToText::new(None, "http://x".to_string(), "whisper-1".to_string()).is_err());
        assert!(
            SpeechToText::new(Some(String::new()), "http://x".to_string(), "whisper-1".to_string())
                .is_err()
        );
    }

    #[test]
    fn transcription_response_parses() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text": "hello there"}"#).unwrap();
        assert_eq!(parsed.text, "hello there");
    }
}
