//! Per-room fan-out to connected sessions.
//!
//! Uses a tokio broadcast channel for O(1) send to all subscribers. Each
//! frame carries the session to exclude (usually the submitter, which
//! already applied the operations optimistically); filtering happens at
//! the receiving connection task, so the send path stays lock-free.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::protocol::SessionId;

/// One pre-encoded server message fanned out to a room's sessions.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Session whose connection must not deliver this frame.
    pub exclude: Option<SessionId>,
    /// Encoded JSON, shared across all receivers.
    pub payload: Arc<String>,
}

impl Frame {
    /// Whether the given session's connection should deliver this frame.
    pub fn is_for(&self, session: SessionId) -> bool {
        self.exclude != Some(session)
    }
}

struct SessionEntry {
    last_seen: Instant,
}

/// Connected sessions of a single room.
///
/// Owned exclusively by that room's host task, so no locking: every
/// mutation arrives through the host's command channel.
pub struct SessionRegistry {
    sender: broadcast::Sender<Frame>,
    sessions: HashMap<SessionId, SessionEntry>,
    capacity: usize,
}

impl SessionRegistry {
    /// `capacity` bounds how many frames a slow connection may fall
    /// behind before it starts dropping (and must resync).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, sessions: HashMap::new(), capacity }
    }

    /// Registers a session and hands back its frame receiver.
    pub fn join(&mut self, session: SessionId) -> broadcast::Receiver<Frame> {
        self.sessions.insert(session, SessionEntry { last_seen: Instant::now() });
        self.sender.subscribe()
    }

    pub fn leave(&mut self, session: SessionId) -> bool {
        self.sessions.remove(&session).is_some()
    }

    /// Records activity for a session, deferring idle pruning.
    pub fn touch(&mut self, session: SessionId) {
        if let Some(entry) = self.sessions.get_mut(&session) {
            entry.last_seen = Instant::now();
        }
    }

    /// Fans a frame out to every subscribed connection. Returns the number
    /// of receivers it reached (before exclusion filtering).
    pub fn broadcast(&self, exclude: Option<SessionId>, payload: Arc<String>) -> usize {
        self.sender.send(Frame { exclude, payload }).unwrap_or(0)
    }

    /// Drops sessions idle longer than `max_idle` and returns them. Their
    /// connections keep a stale receiver; the next delivery attempt on a
    /// closed socket cleans those up.
    pub fn prune_idle(&mut self, max_idle: Duration) -> Vec<SessionId> {
        let now = Instant::now();
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_seen) > max_idle)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.sessions.remove(id);
        }
        stale
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
