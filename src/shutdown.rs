use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc};

use crate::broadcast::BroadcastFabric;
use crate::chatlog::ChatLog;

const SHUTDOWN_MESSAGE: &str = "[Server]: Server is shutting down. Goodbye!\n";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session handle to the shutdown signal. A session selects between
/// reading its next line and `recv()`; once tripped, every subsequent `recv`
/// returns immediately so a session doesn't need to check twice.
pub struct Shutdown {
    notify: broadcast::Receiver<()>,
    tripped: bool,
}

impl Shutdown {
    fn new(notify: broadcast::Receiver<()>) -> Self {
        Self {
            notify,
            tripped: false,
        }
    }

    pub async fn recv(&mut self) {
        if self.tripped {
            return;
        }
        let _ = self.notify.recv().await;
        self.tripped = true;
    }
}

/// Announces and drives the global shutdown: stops new admissions, tells
/// every connected session, then waits (with a bounded timeout) for every
/// session's task to actually finish before returning.
///
/// Draining works by reference counting: `completion_guard()` hands out
/// clones of an mpsc sender that each session task holds for its lifetime.
/// `shutdown()` drops its own template clone and then waits for the receiver
/// to observe every remaining sender dropped, i.e. every session finished.
pub struct ShutdownCoordinator {
    accepting: AtomicBool,
    notify_tx: broadcast::Sender<()>,
    complete: Mutex<CompleteChannel>,
}

struct CompleteChannel {
    template_tx: Option<mpsc::Sender<()>>,
    rx: Option<mpsc::Receiver<()>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (notify_tx, _) = broadcast::channel(1);
        let (template_tx, rx) = mpsc::channel(1);
        Self {
            accepting: AtomicBool::new(true),
            notify_tx,
            complete: Mutex::new(CompleteChannel {
                template_tx: Some(template_tx),
                rx: Some(rx),
            }),
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// A per-session `Shutdown` receiver, subscribed now so it cannot miss a
    /// signal sent between subscription and first `recv`.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown::new(self.notify_tx.subscribe())
    }

    /// A clone of the completion sentinel. Hold this for the lifetime of a
    /// session's task; dropping it (on task exit) tells the coordinator one
    /// more session has finished draining. Must be acquired before
    /// `is_accepting()` is observed false for that session to be waited on.
    pub async fn completion_guard(&self) -> Option<mpsc::Sender<()>> {
        self.complete.lock().await.template_tx.clone()
    }

    /// Run the C8 procedure: stop admitting new connections, announce the
    /// shutdown, signal every session, and wait for them to drain.
    pub async fn shutdown(&self, fabric: &BroadcastFabric, chat_log: &ChatLog) {
        self.accepting.store(false, Ordering::Release);
        fabric.to_all(SHUTDOWN_MESSAGE, None);
        chat_log.append(SHUTDOWN_MESSAGE).await;
        let _ = self.notify_tx.send(());

        let (template_tx, rx) = {
            let mut complete = self.complete.lock().await;
            (complete.template_tx.take(), complete.rx.take())
        };
        drop(template_tx);

        let Some(mut rx) = rx else { return };
        if tokio::time::timeout(DRAIN_TIMEOUT, rx.recv()).await.is_err() {
            log::warn!("shutdown drain timed out after {DRAIN_TIMEOUT:?}; exiting anyway");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Mailbox;
    use crate::registry::Registry;
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_completes_once_every_guard_drops() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let registry = Arc::new(Registry::new(10));
        let mailbox = Arc::new(Mailbox::new(10));
        let fabric = BroadcastFabric::new(registry, mailbox);
        let chat_log = ChatLog::open("/dev/null").await;

        let guard = coordinator.completion_guard().await.unwrap();
        let mut session_shutdown = coordinator.subscribe();

        let held = tokio::spawn(async move {
            session_shutdown.recv().await;
            drop(guard);
        });

        coordinator.shutdown(&fabric, &chat_log).await;
        held.await.unwrap();
        assert!(!coordinator.is_accepting());
    }
}
