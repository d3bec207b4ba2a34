//! Adapters for the services the assistant talks to: chat completion,
//! speech-to-text and document text extraction.

pub mod completion;
pub mod extraction;
pub mod openai;
pub mod transcription;

pub use completion::{HistoryTurn, LanguageModel, OpenAiChat};
pub use extraction::{DocumentExtractor, FileExtractor};
pub use openai::OpenAiClient;
pub use transcription::{OpenAiWhisper, Transcriber};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unusable response: {0}")]
    InvalidResponse(String),

    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}
