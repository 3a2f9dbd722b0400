use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds concurrent sessions at `max_clients` with a counting semaphore. The
/// accept loop acquires one permit before each `accept`, so a client's TCP
/// connect can succeed immediately while its handshake waits for a permit —
/// the "blocks" branch of the admission-bound choice (see design notes),
/// rather than an accept-then-reject "server full" branch.
///
/// A permit is released automatically when the returned `OwnedSemaphorePermit`
/// drops, which happens when the owning session's task ends — so every
/// acquired permit is released exactly once without a dedicated "release"
/// call to forget.
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
}

impl AdmissionController {
    pub fn new(max_clients: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_clients)),
        }
    }

    /// Wait for a free slot. Only returns `Err` if the semaphore has been
    /// closed (shutdown), which this server never does while accepting.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, tokio::sync::AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }
}
