use std::sync::Arc;

use crate::mailbox::{EnqueueOutcome, Mailbox};
use crate::registry::{Registry, SessionId};

/// Outcome of a private-message delivery attempt.
pub enum DeliveryOutcome {
    Delivered,
    Queued,
    MailboxFull,
}

/// Computes a recipient set from the session registry and fans a line out to
/// each member's outgoing conduit. Never holds the registry guard across a
/// send: it snapshots `(id, conduit)` pairs, drops the guard, then sends.
pub struct BroadcastFabric {
    registry: Arc<Registry>,
    mailbox: Arc<Mailbox>,
}

impl BroadcastFabric {
    pub fn new(registry: Arc<Registry>, mailbox: Arc<Mailbox>) -> Self {
        Self { registry, mailbox }
    }

    /// Send `message` to every session in `room` except `exclude`, if given.
    pub fn to_room(&self, message: &str, exclude: Option<SessionId>, room: &str) {
        for (_, outgoing) in self.registry.snapshot_room(room, exclude) {
            let _ = outgoing.send(message.to_string());
        }
    }

    /// Send `message` to every session except `exclude`, if given.
    pub fn to_all(&self, message: &str, exclude: Option<SessionId>) {
        for (_, outgoing) in self.registry.snapshot_all(exclude) {
            let _ = outgoing.send(message.to_string());
        }
    }

    /// Deliver a private message to the first session authenticated as
    /// `target_username`. If none is online, the message spills into the
    /// offline mailbox at priority 1 (private messages are urgent).
    pub fn to_user(&self, body: &str, target_username: &str, sender_username: &str) -> DeliveryOutcome {
        if let Some(target_id) = self.registry.lookup_by_username(target_username)
            && let Some(outgoing) = self.registry.outgoing_of(target_id)
        {
            let line = format!("[PM from {sender_username}]: {body}\n");
            if outgoing.send(line).is_ok() {
                return DeliveryOutcome::Delivered;
            }
        }

        match self
            .mailbox
            .enqueue(target_username, sender_username, body, 1)
        {
            EnqueueOutcome::Ok => DeliveryOutcome::Queued,
            EnqueueOutcome::Full => DeliveryOutcome::MailboxFull,
        }
    }
}
