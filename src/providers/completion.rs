use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{OpenAiClient, ProviderError};
use crate::session::Role;

/// Reply used when the model returns no content.
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I couldn't generate a response.";

/// One prior chat turn handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce a reply given a system instruction and the conversation so far
    /// (oldest first, ending with the turn to answer).
    async fn complete(&self, system: &str, history: &[HistoryTurn]) -> Result<String, ProviderError>;
}

/// Chat completions via `/v1/chat/completions`.
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, model: &str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn build_messages<'a>(system: &'a str, history: &'a [HistoryTurn]) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(WireMessage {
        role: "system",
        content: system,
    });
    messages.extend(history.iter().map(|turn| WireMessage {
        role: turn.role.as_str(),
        content: &turn.content,
    }));
    messages
}

fn reply_text(resp: ChatResponse) -> String {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string())
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete(&self, system: &str, history: &[HistoryTurn]) -> Result<String, ProviderError> {
        let req = ChatRequest {
            model: &self.model,
            messages: build_messages(system, history),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .client
            .post("chat/completions")
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        Ok(reply_text(resp))
    }
}
