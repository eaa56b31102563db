//! Bounded, ordered conversation transcript.
//!
//! Every transcript starts with one system entry (the seed). The seed is
//! never evicted; once the entry cap is exceeded the oldest non-system
//! entry is dropped first (FIFO).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::{Speaker, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
    cap: usize,
}

impl Transcript {
    /// New transcript holding only the system seed. `cap` counts the seed.
    pub fn seeded(system_prompt: &str, cap: usize) -> Self {
        let mut t = Self { entries: VecDeque::new(), cap: cap.max(1) };
        t.entries.push_back(TranscriptEntry {
            role: Role::System,
            content: system_prompt.to_string(),
            timestamp: Utc::now(),
        });
        t
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push_back(TranscriptEntry {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while self.entries.len() > self.cap {
            let seed_first = self.entries.front().is_some_and(|e| e.role == Role::System);
            if seed_first && self.entries.len() > 1 {
                self.entries.remove(1);
            } else {
                self.entries.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Content of the system seed.
    pub fn system_prompt(&self) -> Option<&str> {
        self.entries
            .front()
            .filter(|e| e.role == Role::System)
            .map(|e| e.content.as_str())
    }

    /// User and assistant entries as provider turns, oldest first.
    pub fn turns(&self) -> Vec<Turn> {
        self.entries
            .iter()
            .filter_map(|e| {
                let speaker = match e.role {
                    Role::User => Speaker::User,
                    Role::Assistant => Speaker::Model,
                    Role::System => return None,
                };
                Some(Turn { speaker, text: e.content.clone() })
            })
            .collect()
    }
}
