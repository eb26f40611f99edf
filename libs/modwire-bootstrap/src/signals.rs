use anyhow::Result;
use tokio::signal;

/// OS signal that ended [`wait_for_shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

#[cfg(unix)]
async fn terminate() -> std::io::Result<()> {
    let mut handler = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    handler.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> std::io::Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

/// Wait for termination signals (Ctrl+C, SIGTERM).
pub async fn wait_for_shutdown() -> Result<ShutdownSignal> {
    let received = tokio::select! {
        res = signal::ctrl_c() => {
            res.inspect_err(|e| tracing::error!(%e, "Failed to install Ctrl+C handler"))?;
            ShutdownSignal::Interrupt
        }
        res = terminate() => {
            res.inspect_err(|e| tracing::error!(%e, "Failed to install SIGTERM handler"))?;
            ShutdownSignal::Terminate
        }
    };

    tracing::info!(signal = %received, "Shutdown signal received, initiating graceful shutdown");
    Ok(received)
}
