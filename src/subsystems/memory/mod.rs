//! Memory subsystem: in-process session transcripts.
//!
//! [`SessionManager`] maps a session id to its own bounded [`Transcript`].
//! Each transcript sits behind its own lock, so appends within a session
//! are serialised while different sessions never contend. The number of
//! live sessions is capped; the least-recently-used one is evicted when a
//! new session would exceed it.
//!
//! Nothing is persisted: all transcripts are lost on restart.

pub mod transcript;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::MemoryConfig;

pub use transcript::{Role, Transcript, TranscriptEntry};

/// Session used by requests that do not name one.
pub const DEFAULT_SESSION: &str = "default";

pub type SharedTranscript = Arc<Mutex<Transcript>>;

struct SessionSlot {
    transcript: SharedTranscript,
    last_used: u64,
}

struct Sessions {
    slots: HashMap<String, SessionSlot>,
    clock: u64,
}

pub struct SessionManager {
    sessions: Mutex<Sessions>,
    system_prompt: String,
    transcript_cap: usize,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(system_prompt: impl Into<String>, config: &MemoryConfig) -> Self {
        Self {
            sessions: Mutex::new(Sessions { slots: HashMap::new(), clock: 0 }),
            system_prompt: system_prompt.into(),
            transcript_cap: config.transcript_cap,
            max_sessions: config.max_sessions.max(1),
        }
    }

    /// Fetch the transcript for `session_id`, creating a freshly seeded one
    /// if needed, and mark it most recently used.
    pub async fn open(&self, session_id: &str) -> SharedTranscript {
        let mut sessions = self.sessions.lock().await;
        sessions.clock += 1;
        let now = sessions.clock;

        if let Some(slot) = sessions.slots.get_mut(session_id) {
            slot.last_used = now;
            return slot.transcript.clone();
        }

        if sessions.slots.len() >= self.max_sessions {
            let oldest = sessions
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                sessions.slots.remove(&id);
                debug!(session_id = %id, "evicted least-recently-used session");
            }
        }

        let transcript =
            Arc::new(Mutex::new(Transcript::seeded(&self.system_prompt, self.transcript_cap)));
        sessions.slots.insert(
            session_id.to_string(),
            SessionSlot { transcript: transcript.clone(), last_used: now },
        );
        debug!(%session_id, "session created");
        transcript
    }

    /// Existing transcript for `session_id`, without creating or touching it.
    pub async fn get(&self, session_id: &str) -> Option<SharedTranscript> {
        let sessions = self.sessions.lock().await;
        sessions.slots.get(session_id).map(|slot| slot.transcript.clone())
    }

    /// Copy of a session's entries, or `None` for unknown sessions.
    pub async fn snapshot(&self, session_id: &str) -> Option<Vec<TranscriptEntry>> {
        let transcript = self.get(session_id).await?;
        let guard = transcript.lock().await;
        Some(guard.snapshot())
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
