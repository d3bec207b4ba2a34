//! Ingestion writers: transcript appender and document uploader.
//!
//! Both paths run their external calls (transcription, extraction, embedding)
//! without touching the registry, then commit the result in a single append.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    app::{AppError, ExternalCalls, Service},
    config::ChunkingConfig,
    eid::Eid,
    providers::{DocumentExtractor, ProviderError, Transcriber},
    registry::SessionRegistry,
    semantic::{self, EmbeddingProvider},
    session::{NoteChunk, TranscriptSegment},
};

/// Result of a document upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub filename: String,
    pub chunks: usize,
    pub message: String,
}

pub struct Ingestor {
    registry: Arc<SessionRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn DocumentExtractor>,
    chunking: ChunkingConfig,
    calls: ExternalCalls,
}

impl Ingestor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn DocumentExtractor>,
        chunking: ChunkingConfig,
        calls: ExternalCalls,
    ) -> Self {
        Self {
            registry,
            embedder,
            transcriber,
            extractor,
            chunking,
            calls,
        }
    }

    fn ensure_session(&self, session_id: &Eid) -> Result<(), AppError> {
        self.registry
            .with_session(session_id, |_| ())
            .ok_or_else(|| AppError::SessionNotFound(session_id.clone()))
    }

    /// Transcribe an audio window and store it as a transcript segment.
    ///
    /// Returns `Ok(None)` when the window was empty or contained no speech.
    pub async fn append_transcript(
        &self,
        session_id: &Eid,
        audio: Vec<u8>,
        filename: &str,
        timestamp: f64,
        cancel: &CancellationToken,
    ) -> Result<Option<TranscriptSegment>, AppError> {
        self.ensure_session(session_id)?;
        if audio.is_empty() {
            log::debug!("empty audio for session {session_id} at {timestamp}s");
            return Ok(None);
        }

        let text = self
            .calls
            .run(
                Service::Transcription,
                cancel,
                self.transcriber.transcribe(audio, filename),
            )
            .await?;

        self.append_transcript_text(session_id, &text, timestamp, cancel)
            .await
    }

    /// Store already-transcribed text as a transcript segment.
    ///
    /// A failed embedding does not lose the text: the segment is stored
    /// without a vector and is simply never retrieved as context.
    pub async fn append_transcript_text(
        &self,
        session_id: &Eid,
        text: &str,
        timestamp: f64,
        cancel: &CancellationToken,
    ) -> Result<Option<TranscriptSegment>, AppError> {
        self.ensure_session(session_id)?;

        let text = text.trim();
        if text.is_empty() {
            log::debug!("nothing transcribed for session {session_id} at {timestamp}s");
            return Ok(None);
        }

        // validate before paying for an embedding
        let mut segment = TranscriptSegment::new(session_id.clone(), text, timestamp, None)?;

        segment.embedding = match self
            .calls
            .run(Service::Embedding, cancel, self.embedder.embed(text))
            .await
        {
            Ok(embedding) if embedding.len() == self.embedder.dimensions() => Some(embedding),
            Ok(embedding) => {
                log::warn!(
                    "storing transcript segment without embedding: expected {} dims, got {}",
                    self.embedder.dimensions(),
                    embedding.len()
                );
                None
            }
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                log::warn!("storing transcript segment without embedding: {e}");
                None
            }
        };

        if !self.registry.append_transcript(session_id, segment.clone()) {
            return Err(AppError::SessionNotFound(session_id.clone()));
        }

        log::info!(
            "session {session_id}: transcript segment at {timestamp}s ({} chars)",
            segment.text.len()
        );
        Ok(Some(segment))
    }

    /// Extract, chunk, embed and store an uploaded document.
    pub async fn ingest_document(
        &self,
        session_id: &Eid,
        filename: &str,
        bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, AppError> {
        self.ensure_session(session_id)?;
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(AppError::validation("filename is required"));
        }

        let text = self.extract(filename, bytes, cancel).await?;
        if text.trim().is_empty() {
            return Err(AppError::validation(format!("{filename}: file appears empty")));
        }

        let chunks = semantic::chunk(&text, self.chunking.chunk_size, self.chunking.overlap)?;
        log::debug!("{filename}: {} chunks", chunks.len());

        let embeddings = self
            .calls
            .run(Service::Embedding, cancel, self.embedder.embed_batch(&chunks))
            .await?;
        self.check_dimensions(chunks.len(), &embeddings)?;

        let notes: Vec<NoteChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| NoteChunk {
                id: Eid::new(),
                session_id: session_id.clone(),
                filename: filename.to_string(),
                text,
                embedding,
                chunk_index,
            })
            .collect();
        let count = notes.len();

        if !self.registry.append_note_chunks(session_id, notes) {
            return Err(AppError::SessionNotFound(session_id.clone()));
        }

        log::info!("session {session_id}: indexed {count} chunks from {filename}");
        Ok(UploadReport {
            filename: filename.to_string(),
            chunks: count,
            message: format!("Uploaded and indexed {count} chunks from {filename}"),
        })
    }

    async fn extract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<String, AppError> {
        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();
        let task = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes, &name));

        let extracted = self
            .calls
            .run(Service::Extraction, cancel, async move {
                task.await.map_err(|e| e.to_string())
            })
            .await?;

        match extracted {
            Ok(text) => Ok(text),
            Err(e @ ProviderError::Unsupported(_)) => Err(AppError::validation(e.to_string())),
            Err(e) => Err(AppError::external(Service::Extraction, e)),
        }
    }

    /// Every vector of one upload must match the provider's dimensionality.
    fn check_dimensions(&self, expected_len: usize, embeddings: &[Vec<f32>]) -> Result<(), AppError> {
        if embeddings.len() != expected_len {
            return Err(AppError::external(
                Service::Embedding,
                format!("got {} embeddings for {expected_len} chunks", embeddings.len()),
            ));
        }

        let dims = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
            return Err(AppError::external(
                Service::Embedding,
                format!("expected {dims}-dimensional vectors, got {}", bad.len()),
            ));
        }

        Ok(())
    }
}
