//! In-memory store of all sessions.
//!
//! The outer map lock is held only for lookup, insert and remove. Each session
//! sits behind its own lock so independent sessions never wait on each other.
//! Nothing here is held across an `.await`.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use crate::{
    app::AppError,
    eid::Eid,
    session::{ChatMessage, NoteChunk, Session, SessionDetail, SessionSummary, TranscriptSegment},
};

struct SessionSlot {
    /// Insertion sequence, breaks ties between equal creation times
    seq: u64,
    session: RwLock<Session>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Eid, Arc<SessionSlot>>>,
    next_seq: AtomicU64,
}

// Writers only push/extend/assign, which never leave a session half-updated,
// so a poisoned lock still guards consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session. Fails if `id` is already taken.
    pub fn create_session(
        &self,
        id: Eid,
        name: &str,
        class_name: &str,
    ) -> Result<Session, AppError> {
        let mut sessions = write(&self.sessions);
        if sessions.contains_key(&id) {
            return Err(AppError::AlreadyExists(id));
        }

        let session = Session::new(id.clone(), name, class_name);
        let slot = SessionSlot {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            session: RwLock::new(session.clone()),
        };
        sessions.insert(id, Arc::new(slot));

        log::info!("created session {} ({name} / {class_name})", session.id);
        Ok(session)
    }

    /// Snapshot of a session, if present.
    pub fn get_session(&self, id: &Eid) -> Option<Session> {
        self.with_session(id, Session::clone)
    }

    /// Run `f` against a session under its read lock.
    pub fn with_session<R>(&self, id: &Eid, f: impl FnOnce(&Session) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let session = read(&slot.session);
        Some(f(&session))
    }

    /// All sessions, newest first. Equal creation times keep insertion order.
    pub fn list_sessions(&self) -> Vec<Session> {
        self.collect_sorted(Session::clone)
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.collect_sorted(Session::summary)
    }

    pub fn detail(&self, id: &Eid) -> Option<SessionDetail> {
        self.with_session(id, Session::detail)
    }

    /// Append a transcript segment. Returns false if the session is gone.
    pub fn append_transcript(&self, session_id: &Eid, segment: TranscriptSegment) -> bool {
        self.mutate(session_id, |session| session.transcript_segments.push(segment))
    }

    /// Append a batch of note chunks under one write lock, so readers see all
    /// of them or none.
    pub fn append_note_chunks(&self, session_id: &Eid, chunks: Vec<NoteChunk>) -> bool {
        self.mutate(session_id, |session| session.note_chunks.extend(chunks))
    }

    pub fn append_chat_message(&self, session_id: &Eid, message: ChatMessage) -> bool {
        self.mutate(session_id, |session| session.chat_messages.push(message))
    }

    pub fn set_recording(&self, session_id: &Eid, recording: bool) -> bool {
        self.mutate(session_id, |session| session.is_recording = recording)
    }

    /// Remove a session and everything in it. Deleting a missing id is fine.
    pub fn delete_session(&self, id: &Eid) {
        if write(&self.sessions).remove(id).is_some() {
            log::info!("deleted session {id}");
        }
    }

    pub fn len(&self) -> usize {
        read(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: &Eid) -> Option<Arc<SessionSlot>> {
        read(&self.sessions).get(id).cloned()
    }

    fn mutate(&self, id: &Eid, f: impl FnOnce(&mut Session)) -> bool {
        match self.slot(id) {
            Some(slot) => {
                f(&mut write(&slot.session));
                true
            }
            None => {
                log::debug!("session {id} not found, dropping write");
                false
            }
        }
    }

    fn collect_sorted<R>(&self, f: impl Fn(&Session) -> R) -> Vec<R> {
        let slots: Vec<Arc<SessionSlot>> = read(&self.sessions).values().cloned().collect();

        let mut rows: Vec<(chrono::DateTime<chrono::Utc>, u64, R)> = slots
            .iter()
            .map(|slot| {
                let session = read(&slot.session);
                (session.created_at, slot.seq, f(&session))
            })
            .collect();

        rows.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        rows.into_iter().map(|(_, _, row)| row).collect()
    }
}
