//! HTTP serving with graceful shutdown.
//!
//! Shutdown can be driven by OS signals, an external `CancellationToken`,
//! or an arbitrary future.

use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::Application;

/// How the server should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Bind `addr` and serve `app` until shutdown is requested.
pub async fn serve(app: Application, addr: &str, shutdown: ShutdownOptions) -> anyhow::Result<()> {
    let cancel = match &shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = modwire_bootstrap::wait_for_shutdown().await {
                    tracing::warn!(
                        error = %e,
                        "shutdown: primary waiter failed; falling back to ctrl_c()"
                    );
                    let _ = tokio::signal::ctrl_c().await;
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on '{addr}'"))?;
    serve_listener(listener, app, cancel).await
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve_listener(
    listener: TcpListener,
    app: Application,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    let router = app.into_router();
    tracing::info!("HTTP server bound on {}", local);

    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully (cancellation)");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
