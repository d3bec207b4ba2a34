use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::{app::AppError, eid::Eid};

/// Author of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Where a retrievable fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Transcript,
    Notes,
}

impl Source {
    /// Tag used when rendering grounding context, e.g. `[NOTES]`.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Transcript => "TRANSCRIPT",
            Source::Notes => "NOTES",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Transcript => write!(f, "transcript"),
            Source::Notes => write!(f, "notes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub id: Eid,
    pub session_id: Eid,
    pub text: String,
    /// Seconds since recording started, not wall clock
    pub timestamp: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl TranscriptSegment {
    pub fn new(
        session_id: Eid,
        text: impl Into<String>,
        timestamp: f64,
        embedding: Option<Vec<f32>>,
    ) -> Result<Self, AppError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(AppError::validation(format!(
                "transcript timestamp must be a non-negative number, got {timestamp}"
            )));
        }

        Ok(Self {
            id: Eid::new(),
            session_id,
            text: text.into(),
            timestamp,
            created_at: Utc::now(),
            embedding,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteChunk {
    pub id: Eid,
    pub session_id: Eid,
    pub filename: String,
    pub text: String,
    pub embedding: Vec<f32>,
    /// Zero-based, unique within (session, filename)
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Eid,
    pub session_id: Eid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: Eid, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Eid::new(),
            session_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One lecture or study sitting.
///
/// Collections only grow. The whole aggregate goes away on session delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Eid,
    pub name: String,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
    pub is_recording: bool,
    pub transcript_segments: Vec<TranscriptSegment>,
    pub note_chunks: Vec<NoteChunk>,
    pub chat_messages: Vec<ChatMessage>,
}

impl Session {
    pub fn new(id: Eid, name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            class_name: class_name.into(),
            created_at: Utc::now(),
            is_recording: false,
            transcript_segments: Vec::new(),
            note_chunks: Vec::new(),
            chat_messages: Vec::new(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            class_name: self.class_name.clone(),
            created_at: self.created_at,
            is_recording: self.is_recording,
            transcript_count: self.transcript_segments.len(),
            note_chunk_count: self.note_chunks.len(),
        }
    }

    pub fn detail(&self) -> SessionDetail {
        let mut note_files: Vec<String> = Vec::new();
        for chunk in &self.note_chunks {
            if !note_files.contains(&chunk.filename) {
                note_files.push(chunk.filename.clone());
            }
        }

        SessionDetail {
            id: self.id.clone(),
            name: self.name.clone(),
            class_name: self.class_name.clone(),
            created_at: self.created_at,
            is_recording: self.is_recording,
            transcript_segments: self
                .transcript_segments
                .iter()
                .map(|s| SegmentView {
                    id: s.id.clone(),
                    text: s.text.clone(),
                    timestamp: s.timestamp,
                })
                .collect(),
            chat_messages: self
                .chat_messages
                .iter()
                .map(|m| MessageView {
                    id: m.id.clone(),
                    role: m.role,
                    content: m.content.clone(),
                    created_at: m.created_at,
                })
                .collect(),
            note_files,
        }
    }
}

/// Listing row for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Eid,
    pub name: String,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
    pub is_recording: bool,
    pub transcript_count: usize,
    pub note_chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentView {
    pub id: Eid,
    pub text: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Eid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Full session view without embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: Eid,
    pub name: String,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
    pub is_recording: bool,
    pub transcript_segments: Vec<SegmentView>,
    pub chat_messages: Vec<MessageView>,
    /// Distinct uploaded filenames in upload order
    pub note_files: Vec<String>,
}
