use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::UnboundedSender;

/// Opaque, monotonically-allocated session identity. Never a reused OS handle
/// and never random — see the design notes on session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

struct Entry {
    username: Option<String>,
    room: Option<String>,
    outgoing: UnboundedSender<String>,
}

/// Live set of connected sessions: who is online, as whom, and in which room.
/// Never owns a stream directly — only a clone of each session's outgoing
/// conduit, so the broadcast fabric can reach a session without touching its
/// socket.
pub struct Registry {
    max_clients: usize,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

pub enum ReserveOutcome {
    Reserved(SessionId),
    Full,
}

impl Registry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            max_clients,
            next_id: AtomicU64::new(0),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a slot for a not-yet-authenticated connection, bounding
    /// concurrent sessions at `max_clients`. This is a defensive check: the
    /// admission controller (C7) already bounds entry via a semaphore, so this
    /// should not observe `Full` in practice, but the registry enforces the
    /// invariant itself rather than trusting the caller.
    pub fn reserve(&self, outgoing: UnboundedSender<String>) -> ReserveOutcome {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.len() >= self.max_clients {
            return ReserveOutcome::Full;
        }
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        sessions.insert(
            id,
            Entry {
                username: None,
                room: None,
                outgoing,
            },
        );
        ReserveOutcome::Reserved(id)
    }

    /// Attach identity to a reserved slot once authentication succeeds.
    pub fn bind(&self, id: SessionId, username: String, room: String) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.get_mut(&id) {
            entry.username = Some(username);
            entry.room = Some(room);
        }
    }

    /// Change `id`'s room, returning the room it was previously in.
    pub fn set_room(&self, id: SessionId, room: String) -> Option<String> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .get_mut(&id)
            .and_then(|entry| entry.room.replace(room))
    }

    pub fn current_room(&self, id: SessionId) -> Option<String> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(&id).and_then(|entry| entry.room.clone())
    }

    /// First authenticated session bearing `username`, if any.
    pub fn lookup_by_username(&self, username: &str) -> Option<SessionId> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .find(|(_, entry)| entry.username.as_deref() == Some(username))
            .map(|(id, _)| *id)
    }

    /// Usernames of every authenticated session currently in `room`.
    pub fn list_in_room(&self, room: &str) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .filter(|entry| entry.room.as_deref() == Some(room))
            .filter_map(|entry| entry.username.clone())
            .collect()
    }

    /// Per-room occupancy, counting only authenticated sessions.
    pub fn room_census(&self) -> HashMap<String, usize> {
        let sessions = self.sessions.lock().unwrap();
        let mut census = HashMap::new();
        for entry in sessions.values() {
            if let Some(room) = &entry.room {
                *census.entry(room.clone()).or_insert(0) += 1;
            }
        }
        census
    }

    /// Snapshot of `(id, outgoing conduit)` for every authenticated session in
    /// `room`, excluding `exclude` if given. The registry guard is released
    /// before the caller ever sends on any of these conduits.
    pub fn snapshot_room(&self, room: &str, exclude: Option<SessionId>) -> Vec<(SessionId, UnboundedSender<String>)> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .filter(|(id, entry)| Some(**id) != exclude && entry.room.as_deref() == Some(room))
            .map(|(id, entry)| (*id, entry.outgoing.clone()))
            .collect()
    }

    /// Snapshot of `(id, outgoing conduit)` for every session, excluding
    /// `exclude` if given.
    pub fn snapshot_all(&self, exclude: Option<SessionId>) -> Vec<(SessionId, UnboundedSender<String>)> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, entry)| (*id, entry.outgoing.clone()))
            .collect()
    }

    pub fn outgoing_of(&self, id: SessionId) -> Option<UnboundedSender<String>> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(&id).map(|entry| entry.outgoing.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Remove `id`'s slot, returning its username if it had authenticated.
    pub fn release(&self, id: SessionId) -> Option<String> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.remove(&id).and_then(|entry| entry.username)
    }
}
