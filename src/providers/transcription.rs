use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::{OpenAiClient, ProviderError};

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Speech to text. Silence may legitimately come back as an empty string.
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ProviderError>;
}

/// Whisper via `/v1/audio/transcriptions`.
pub struct OpenAiWhisper {
    client: OpenAiClient,
    model: String,
}

impl OpenAiWhisper {
    pub fn new(client: OpenAiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiWhisper {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ProviderError> {
        let len = audio.len();
        let form = Form::new()
            .part("file", Part::bytes(audio).file_name(filename.to_string()))
            .text("model", self.model.clone())
            .text("response_format", "text");

        let text = self
            .client
            .post("audio/transcriptions")
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        log::debug!("transcribed {len} bytes of audio into {} chars", text.len());
        Ok(text)
    }
}
