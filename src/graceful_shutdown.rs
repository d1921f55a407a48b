//! Graceful shutdown

use tokio::signal;

/// Wait for Ctrl+C
async fn interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Could not listen for Ctrl+C: {err}");
        std::future::pending::<()>().await;
    }
}

/// Wait for SIGTERM
#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(err) => {
            tracing::error!("Could not listen for SIGTERM: {err}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Handler for graceful shutdown
///
/// Resolves on Ctrl+C or SIGTERM, in-flight requests are allowed to finish
pub async fn handler() {
    let signal = tokio::select! {
        () = interrupt() => "Ctrl+C",
        () = terminate() => "SIGTERM",
    };

    tracing::info!("{signal} received, starting graceful shutdown");
}
