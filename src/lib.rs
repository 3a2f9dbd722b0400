pub mod admission;
pub mod broadcast;
pub mod chatlog;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod mailbox;
pub mod recent;
pub mod registry;
pub mod session;
pub mod shutdown;

use std::sync::Arc;

use tokio::net::TcpListener;

use admission::AdmissionController;
use broadcast::BroadcastFabric;
use chatlog::ChatLog;
use config::Config;
use credentials::CredentialStore;
use error::BootstrapError;
use mailbox::Mailbox;
use recent::RecentRing;
use registry::Registry;
use session::SessionContext;
use shutdown::ShutdownCoordinator;

/// Construct every shared component from a resolved configuration. Exposed
/// separately from [`serve`] so tests can build a context, bind an ephemeral
/// port, and drive the server without going through the CLI entry point.
pub async fn build_context(config: Config) -> Arc<SessionContext> {
    let credentials = Arc::new(CredentialStore::new(config.credential_path.clone()));
    let chat_log = Arc::new(ChatLog::open(&config.log_path).await);
    let registry = Arc::new(Registry::new(config.max_clients));
    let mailbox = Arc::new(Mailbox::new(config.mailbox_capacity));
    let recent = Arc::new(RecentRing::new(config.recent_capacity));
    let fabric = Arc::new(BroadcastFabric::new(registry.clone(), mailbox.clone()));
    let shutdown = Arc::new(ShutdownCoordinator::new());

    Arc::new(SessionContext {
        config: Arc::new(config),
        credentials,
        registry,
        mailbox,
        recent,
        fabric,
        chat_log,
        shutdown,
    })
}

/// Bind the listener and run the admission-gated accept loop until
/// `ctx.shutdown` stops accepting, spawning one session task per connection.
/// Returns once every in-flight session has drained.
pub async fn serve(ctx: Arc<SessionContext>, listener: TcpListener) {
    let admission = AdmissionController::new(ctx.config.max_clients);
    let mut shutdown_rx = ctx.shutdown.subscribe();

    while ctx.shutdown.is_accepting() {
        let permit = tokio::select! {
            res = admission.acquire() => match res {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown_rx.recv() => break,
        };

        let (stream, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::warn!("accept failed: {err}");
                    drop(permit);
                    continue;
                }
            },
            _ = shutdown_rx.recv() => {
                drop(permit);
                break;
            }
        };

        let completion_guard = ctx.shutdown.completion_guard().await;
        let session_ctx = ctx.clone();
        tokio::spawn(async move {
            session::run(stream, peer, session_ctx, permit, completion_guard).await;
        });
    }
}

/// Bind the configured listener address, reporting a [`BootstrapError`] on
/// failure instead of panicking.
pub async fn bind(config: &Config) -> Result<TcpListener, BootstrapError> {
    let addr = format!("{}:{}", config.bind_addr, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| BootstrapError::Bind { addr, source })
}
