use std::fmt::Display;

use crate::{eid::Eid, semantic::ChunkError};

/// External collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Completion,
    Transcription,
    Extraction,
}

impl Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Service::Embedding => "embedding",
            Service::Completion => "completion",
            Service::Transcription => "transcription",
            Service::Extraction => "extraction",
        };
        write!(f, "{name}")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("session not found: {0}")]
    SessionNotFound(Eid),

    #[error("session with id {0} already exists")]
    AlreadyExists(Eid),

    #[error("{service} service failed: {message}")]
    External { service: Service, message: String },

    #[error(transparent)]
    InvalidChunking(#[from] ChunkError),

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn external(service: Service, message: impl Display) -> Self {
        Self::External {
            service,
            message: message.to_string(),
        }
    }
}
