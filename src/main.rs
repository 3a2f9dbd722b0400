use netchat::config::Config;
use netchat::error::BootstrapError;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("netchatd: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BootstrapError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    log::info!(
        "starting netchatd on {}:{} (max_clients={}, default_room={})",
        config.bind_addr,
        config.port,
        config.max_clients,
        config.default_room
    );

    let listener = netchat::bind(&config).await?;
    let ctx = netchat::build_context(config).await;

    let ctx_for_signal = ctx.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("shutdown signal received");
            ctx_for_signal
                .shutdown
                .shutdown(&ctx_for_signal.fabric, &ctx_for_signal.chat_log)
                .await;
        }
    });

    netchat::serve(ctx.clone(), listener).await;
    // `serve` only returns once `ctx.shutdown` has stopped accepting, which
    // happens inside `signal_task`'s call to `shutdown()` — wait for that
    // call to finish draining sessions rather than cutting it off.
    let _ = signal_task.await;
    log::info!("netchatd exiting");
    Ok(())
}
