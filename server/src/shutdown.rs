//! Process signals that stop the server.

use log::{info, warn};
use std::future::Future;
use std::io;

/// Resolves once the process is asked to stop.
///
/// On Unix this is ctrl-c or SIGTERM, whichever comes first. The SIGTERM
/// handler is installed before this returns, so a signal delivered before the
/// future is first polled still counts. Elsewhere only ctrl-c is watched.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received ctrl-c"),
                Err(e) => {
                    warn!("Failed to listen for ctrl-c: {}", e);
                    terminate.recv().await;
                    info!("Received SIGTERM");
                }
            },
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received ctrl-c"),
            Err(e) => {
                warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
