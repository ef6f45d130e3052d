//! ShutdownCoordinator: the single-fire termination signal.
//!
//! Every path to process shutdown (an operator signal, a forwarding rule that
//! can no longer make progress, an explicit request from the caller) funnels
//! into one [`ShutdownCoordinator`].  The first `fire` wins and records its
//! [`ShutdownReason`]; later calls are no-ops.  Once fired it stays fired.
//!
//! The coordinator is a thin wrapper over a `tokio::sync::watch` channel
//! holding `Option<ShutdownReason>`, so any number of tasks can wait on it and
//! clones are cheap.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Why the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The operating system delivered a termination signal.
    Interrupted { signal: String },
    /// A forwarding rule failed to bind, listen or accept.
    ListenerFailed { rule: String, error: String },
    /// The owning code asked for shutdown.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupted { signal } => write!(f, "caught signal {signal}"),
            ShutdownReason::ListenerFailed { rule, error } => {
                write!(f, "forwarding {rule} failed: {error}")
            }
            ShutdownReason::Requested => f.write_str("shutdown requested"),
        }
    }
}

/// Shared, idempotent shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal with `reason`.
    ///
    /// Returns `true` only for the call that actually fired it; every later
    /// call (from any task) returns `false` and leaves the first reason in
    /// place.
    pub fn fire(&self, reason: ShutdownReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_fired(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The reason recorded by the first `fire`, if any.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.tx.borrow().clone()
    }

    /// Resolves once the signal has fired; immediately if it already has.
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let fired = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|reason| reason.clone());
        fired.unwrap_or(ShutdownReason::Requested)
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
