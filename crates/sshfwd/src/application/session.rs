//! SessionManager: runs every forwarding rule until something ends the session.
//!
//! The manager starts one [`ForwardingListener`] per rule, watches the
//! caller-supplied interrupt future, and returns as soon as the
//! [`ShutdownCoordinator`] fires, whichever source fired it.  Listeners stop
//! accepting on their own once the coordinator fires; the manager gives them
//! a short grace period to release their sockets before returning.
//!
//! Tearing down the transport is the caller's job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sshfwd_core::ForwardRule;

use crate::application::listener::{ForwardingListener, ListenerError};
use crate::application::shutdown::{ShutdownCoordinator, ShutdownReason};
use crate::application::transport::Transport;

/// How long `run` waits for listeners to wind down after shutdown fires.
pub const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the rule set and the shutdown signal for one session.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    rules: Vec<ForwardRule>,
    shutdown: ShutdownCoordinator,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, rules: Vec<ForwardRule>) -> Self {
        Self {
            transport,
            rules,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// A handle the caller can use to end the session with
    /// [`ShutdownReason::Requested`], or to observe it.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs until shutdown fires and returns the reason.
    ///
    /// `interrupt` resolves with a signal name when the operator asks the
    /// process to stop (see `infrastructure::signal::interrupted`).  Tests
    /// pass `std::future::pending()`.
    pub async fn run<F>(self, interrupt: F) -> ShutdownReason
    where
        F: Future<Output = String> + Send + 'static,
    {
        let SessionManager {
            transport,
            rules,
            shutdown,
        } = self;

        if rules.is_empty() {
            warn!("no forwarding rules configured; waiting for shutdown");
        }

        let listeners: Vec<JoinHandle<Result<(), ListenerError>>> = rules
            .into_iter()
            .map(|rule| {
                info!("forwarding connections from {rule}");
                let listener =
                    ForwardingListener::new(rule, Arc::clone(&transport), shutdown.clone());
                tokio::spawn(listener.run())
            })
            .collect();

        let watcher = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let signal = interrupt.await;
                info!("caught signal: {signal}");
                shutdown.fire(ShutdownReason::Interrupted { signal });
            })
        };

        let reason = shutdown.wait().await;
        info!("shutting down: {reason}");
        watcher.abort();

        for listener in listeners {
            match tokio::time::timeout(LISTENER_STOP_TIMEOUT, listener).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("listener task ended abnormally: {e}"),
                Err(_) => debug!("listener did not stop within {LISTENER_STOP_TIMEOUT:?}"),
            }
        }

        reason
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
