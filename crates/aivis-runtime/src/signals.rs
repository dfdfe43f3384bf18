//! Termination and reload signal listeners.

use aivis_core::{AppConfig, SharedConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolves on SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM; only Ctrl+C will stop");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
}

/// Cancel `token` on the first termination signal.
pub fn cancel_on_termination(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = termination() => token.cancel(),
            () = token.cancelled() => {}
        }
    })
}

/// Replace `shared` with `reload()` on every SIGHUP until `stop` fires.
///
/// `reload` returning `None` keeps the current configuration.
pub fn reload_on_hangup<F>(shared: SharedConfig, reload: F, stop: CancellationToken) -> JoinHandle<()>
where
    F: Fn() -> Option<AppConfig> + Send + 'static,
{
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "Cannot listen for SIGHUP; configuration reload disabled");
                    return;
                }
            };
            loop {
                tokio::select! {
                    () = stop.cancelled() => return,
                    received = hangup.recv() => {
                        if received.is_none() {
                            return;
                        }
                        if let Some(config) = reload() {
                            shared.replace(config);
                            info!("Configuration reloaded");
                        }
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (shared, reload);
            stop.cancelled().await;
        }
    })
}
