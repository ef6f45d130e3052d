//! Operator interrupt detection.

use tracing::{error, warn};

/// Resolves with the name of the first termination signal received:
/// Ctrl-C everywhere, plus SIGTERM and SIGQUIT on Unix.
///
/// If no handler can be installed at all the future never resolves; the
/// session then ends only through its other shutdown paths.
pub async fn interrupted() -> String {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::quit()),
        ) {
            (Ok(mut term), Ok(mut quit)) => {
                return tokio::select! {
                    name = ctrl_c() => name,
                    _ = term.recv() => "SIGTERM".to_string(),
                    _ = quit.recv() => "SIGQUIT".to_string(),
                };
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("cannot install SIGTERM/SIGQUIT handlers: {e}");
            }
        }
    }

    ctrl_c().await
}

async fn ctrl_c() -> String {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT".to_string(),
        Err(e) => {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending().await
        }
    }
}
