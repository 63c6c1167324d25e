//! r2d2 - IRC channel agent.

use futures_util::future::join_all;
use r2d2::config::{self, Config};
use r2d2::dispatch::Dispatcher;
use r2d2::handlers::{Collaborators, Registry};
use r2d2::network::EventKind;
use r2d2::session::SessionManager;
use r2d2::transmit::Transmitter;
use r2d2::{http, publish};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const QUIT_MESSAGE: &str = "beep beedibeep";

/// How long background tasks get to notice the shutdown signal.
const TASK_GRACE: Duration = Duration::from_secs(5);

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "r2d2.toml".to_string());

    let loaded = Config::load(&config_path);
    init_tracing(loaded.as_ref().is_ok_and(|c| c.irc.debug));

    let config = loaded.map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    if let Err(problems) = config::validate(&config) {
        for problem in &problems {
            error!(path = %config_path, error = %problem, "Invalid config");
        }
        anyhow::bail!("{} problem(s) in {config_path}", problems.len());
    }

    info!(
        server = %config.irc.server,
        nick = %config.irc.nick,
        channel = %config.irc.channel,
        "Starting r2d2"
    );

    let config = Arc::new(config);
    let client = http::client()?;

    let mut session = SessionManager::new(Arc::clone(&config))
        .start()
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to start session");
            e
        })?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let transmitter = Transmitter::new(session.outbound().clone());

    let registry = Arc::new(Registry::new(Collaborators::from_config(
        &config,
        client.clone(),
    )));
    let dispatcher = Dispatcher::new(
        session.nick(),
        session.channel(),
        registry,
        transmitter.clone(),
        config.irc.handler_timeout(),
    )?;

    let mut tasks = vec![tokio::spawn(dispatcher.run(
        session.events().subscribe(EventKind::Message, "dispatch"),
        shutdown_tx.subscribe(),
    ))];
    tasks.extend(publish::spawn_all(
        &config,
        session.channel(),
        session.events(),
        &client,
        &transmitter,
        &shutdown_tx,
    )?);
    info!(tasks = tasks.len(), "Agent running");

    let lost = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Signal handler failed");
            }
            info!("Interrupted");
            None
        }
        e = session.closed() => Some(e),
    };

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(TASK_GRACE, join_all(tasks)).await.is_err() {
        warn!("Background tasks did not stop in time");
    }

    match lost {
        None => {
            session.shutdown(QUIT_MESSAGE).await;
            info!("Goodbye");
            Ok(())
        }
        Some(e) => {
            error!(error = %e, code = e.error_code(), "Connection lost");
            Err(e.into())
        }
    }
}
