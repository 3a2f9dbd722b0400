use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single undelivered private message awaiting the next authentication as
/// its recipient.
#[derive(Debug, Clone)]
pub struct MailboxEntry {
    pub recipient: String,
    pub body: String,
    pub sender: String,
    pub enqueued_at: u64,
    pub priority: u32,
    seq: u64,
}

pub enum EnqueueOutcome {
    Ok,
    Full,
}

/// Global bounded priority queue of offline private messages, keyed by
/// recipient. `drain_for` returns matches in priority order (highest first,
/// FIFO among equal priorities) and leaves every other entry untouched.
pub struct Mailbox {
    capacity: usize,
    next_seq: AtomicU64,
    entries: Mutex<Vec<MailboxEntry>>,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, recipient: &str, sender: &str, body: &str, priority: u32) -> EnqueueOutcome {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity {
            return EnqueueOutcome::Full;
        }
        entries.push(MailboxEntry {
            recipient: recipient.to_string(),
            body: body.to_string(),
            sender: sender.to_string(),
            enqueued_at: now_secs(),
            priority,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });
        EnqueueOutcome::Ok
    }

    /// Remove and return every entry addressed to `recipient`, highest
    /// priority first and FIFO among ties. Everything else is left in place.
    pub fn drain_for(&self, recipient: &str) -> Vec<MailboxEntry> {
        let mut entries = self.entries.lock().unwrap();
        let mut matched = Vec::new();
        let mut remaining = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            if entry.recipient == recipient {
                matched.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        *entries = remaining;
        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        matched
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
