//! Question answering over a session's transcript and notes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    app::{AppError, ExternalCalls, Service},
    config::RetrievalConfig,
    eid::Eid,
    providers::{HistoryTurn, LanguageModel},
    registry::SessionRegistry,
    semantic::{search, EmbeddingProvider, ScoredItem, SearchItem},
    session::{ChatMessage, Role, Session, Source},
};

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_PREAMBLE: &str = "You are a helpful study assistant for a student attending a \
lecture. Answer the student's question using the context below, which contains excerpts \
from the live lecture transcript (tagged [TRANSCRIPT], prefixed with the time into the \
lecture) and from the student's uploaded notes (tagged [NOTES]). If the context does not \
contain the answer, say so and answer from general knowledge, making clear which parts \
are not from the lecture. Be concise and reference the lecture timestamps when useful.";

/// `mm:ss` from seconds since recording start. Minutes are not wrapped at 60.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Every retrievable fragment of a session. Segments without an embedding are
/// left out.
pub fn candidates(session: &Session) -> Vec<SearchItem> {
    let transcript = session.transcript_segments.iter().filter_map(|segment| {
        let embedding = segment.embedding.as_ref()?;
        Some(SearchItem {
            text: format!("[{}] {}", format_timestamp(segment.timestamp), segment.text),
            embedding: embedding.clone(),
            source: Source::Transcript,
        })
    });

    let notes = session.note_chunks.iter().map(|chunk| SearchItem {
        text: chunk.text.clone(),
        embedding: chunk.embedding.clone(),
        source: Source::Notes,
    });

    transcript.chain(notes).collect()
}

/// Ranked results rendered as `[SOURCE] text` blocks, best first.
pub fn format_context(results: &[ScoredItem]) -> String {
    results
        .iter()
        .map(|item| format!("[{}] {}", item.source.label(), item.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn system_instruction(context: &str) -> String {
    format!("{SYSTEM_PREAMBLE}\n\nCONTEXT:\n{context}")
}

/// The last `window` messages, oldest first.
pub fn history_window(session: &Session, window: usize) -> Vec<HistoryTurn> {
    let messages = &session.chat_messages;
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|message| HistoryTurn {
            role: message.role,
            content: message.content.clone(),
        })
        .collect()
}

pub struct Assistant {
    registry: Arc<SessionRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    retrieval: RetrievalConfig,
    calls: ExternalCalls,
}

impl Assistant {
    pub fn new(
        registry: Arc<SessionRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        retrieval: RetrievalConfig,
        calls: ExternalCalls,
    ) -> Self {
        Self {
            registry,
            embedder,
            llm,
            retrieval,
            calls,
        }
    }

    /// Top `top_k` fragments of the session for an already embedded query.
    pub fn retrieve(
        &self,
        session_id: &Eid,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredItem>, AppError> {
        let items = self
            .registry
            .with_session(session_id, candidates)
            .ok_or_else(|| AppError::SessionNotFound(session_id.clone()))?;

        Ok(search(query_embedding, &items, top_k))
    }

    /// Answer one question.
    ///
    /// The question is recorded before any external call and stays recorded
    /// if embedding or completion fails afterwards.
    pub async fn ask(
        &self,
        session_id: &Eid,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatMessage, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::validation("message is required"));
        }

        let question = ChatMessage::new(session_id.clone(), Role::User, query);
        if !self.registry.append_chat_message(session_id, question) {
            return Err(AppError::SessionNotFound(session_id.clone()));
        }

        let query_embedding = self
            .calls
            .run(Service::Embedding, cancel, self.embedder.embed(query))
            .await?;

        let results = self.retrieve(session_id, &query_embedding, self.retrieval.top_k)?;
        log::debug!(
            "session {session_id}: {} fragments used as context",
            results.len()
        );

        let window = self.retrieval.history_window;
        let history = self
            .registry
            .with_session(session_id, |session| history_window(session, window))
            .ok_or_else(|| AppError::SessionNotFound(session_id.clone()))?;
        let system = system_instruction(&format_context(&results));

        let reply = self
            .calls
            .run(Service::Completion, cancel, self.llm.complete(&system, &history))
            .await?;

        let answer = ChatMessage::new(session_id.clone(), Role::Assistant, reply);
        if !self.registry.append_chat_message(session_id, answer.clone()) {
            log::warn!("session {session_id} was deleted while answering");
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{NoteChunk, TranscriptSegment};

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(307.9), "05:07");
        assert_eq!(format_timestamp(7500.0), "125:00");
    }

    fn session_with_fragments() -> Session {
        let id = Eid::from("s1");
        let mut session = Session::new(id.clone(), "Lecture 1", "CS101");
        session.transcript_segments.push(
            TranscriptSegment::new(id.clone(), "graphs are sets", 65.0, Some(vec![0.0, 1.0]))
                .unwrap(),
        );
        session
            .transcript_segments
            .push(TranscriptSegment::new(id.clone(), "mumble", 70.0, None).unwrap());
        session.note_chunks.push(NoteChunk {
            id: Eid::new(),
            session_id: id,
            filename: "notes.md".into(),
            text: "a tree is a connected acyclic graph".into(),
            embedding: vec![1.0, 0.0],
            chunk_index: 0,
        });
        session
    }

    #[test]
    fn test_candidates_skip_unembedded_segments() {
        let items = candidates(&session_with_fragments());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "[01:05] graphs are sets");
        assert_eq!(items[0].source, Source::Transcript);
        assert_eq!(items[1].text, "a tree is a connected acyclic graph");
        assert_eq!(items[1].source, Source::Notes);
    }

    #[test]
    fn test_format_context_in_rank_order() {
        let results = vec![
            ScoredItem {
                text: "first".into(),
                score: 0.9,
                source: Source::Notes,
            },
            ScoredItem {
                text: "[00:10] second".into(),
                score: 0.5,
                source: Source::Transcript,
            },
        ];
        assert_eq!(
            format_context(&results),
            "[NOTES] first\n\n---\n\n[TRANSCRIPT] [00:10] second"
        );
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_system_instruction_ends_with_context() {
        let system = system_instruction("[NOTES] x");
        assert!(system.starts_with(SYSTEM_PREAMBLE));
        assert!(system.ends_with("CONTEXT:\n[NOTES] x"));
    }

    #[test]
    fn test_history_window_keeps_most_recent() {
        let mut session = Session::new(Eid::from("s1"), "Lecture", "CS101");
        for i in 0..5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            session
                .chat_messages
                .push(ChatMessage::new(session.id.clone(), role, format!("m{i}")));
        }

        let history = history_window(&session, 3);
        let contents: Vec<_> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
        assert_eq!(history[0].role, Role::User);

        assert_eq!(history_window(&session, 10).len(), 5);
    }
}
