//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or SIGTERM
//! - Translate the first one into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM is unix-only; elsewhere only Ctrl+C is observed

use std::io;

use crate::lifecycle::shutdown::Shutdown;

/// Resolve once SIGINT or SIGTERM arrives.
pub async fn wait_for_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

/// Spawn a task that triggers `shutdown` on the first signal.
pub fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => tracing::info!("Termination signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for signals, shutting down"),
        }
        shutdown.trigger();
    });
}
