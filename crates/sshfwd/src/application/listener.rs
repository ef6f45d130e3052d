//! ForwardingListener: the per-rule accept loop.
//!
//! One listener owns one [`ForwardRule`].  For local-to-remote rules it binds
//! a local TCP socket and relays every accepted connection through the
//! transport; for remote-to-local rules it asks the transport to listen and
//! relays every incoming channel to the local target.
//!
//! Failures split cleanly in two:
//!
//! - Listener-level (bind, listen, accept) failures are fatal for the whole
//!   session.  The listener logs, fires the [`ShutdownCoordinator`] and stops.
//! - Connection-level failures (dialing the target for one accepted
//!   connection) only affect that connection, which is closed and logged.
//!
//! Each accepted connection is handed to its own task, so neither a slow dial
//! nor a long-lived relay ever holds up the accept loop.  When the
//! coordinator fires, the loop stops accepting and drops its listening
//! resource.  Relays already in flight are not interrupted.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sshfwd_core::{Direction, ForwardRule};

use crate::application::forwarder::ConnectionForwarder;
use crate::application::local::{connect_local, TcpChannelListener};
use crate::application::shutdown::{ShutdownCoordinator, ShutdownReason};
use crate::application::transport::{
    Accepted, ChannelListener, Connection, Transport, TransportError,
};

/// Lifecycle of a [`ForwardingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerState {
    Starting,
    /// Accepting connections on `address` (the concrete bound address).
    Listening { address: String },
    /// A listener-level error ended the loop.
    Failed { error: String },
    /// The loop stopped because shutdown fired.
    Stopped,
}

/// Listener-level failures.  Every one of these ends the session.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("unable to listen on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("unable to accept on {address}: {source}")]
    Accept {
        address: String,
        #[source]
        source: TransportError,
    },
}

/// Where each accepted connection is relayed to.
#[derive(Clone)]
enum Target {
    /// Through the transport (local-to-remote rules).
    Transport(Arc<dyn Transport>),
    /// To a local TCP service (remote-to-local rules).
    Local,
}

impl Target {
    async fn open(&self, address: &str) -> Result<Connection, TransportError> {
        match self {
            Target::Transport(transport) => transport.dial(address).await,
            Target::Local => connect_local(address).await,
        }
    }
}

/// Accept loop for one [`ForwardRule`].
pub struct ForwardingListener {
    rule: ForwardRule,
    transport: Arc<dyn Transport>,
    shutdown: ShutdownCoordinator,
    forwarder: ConnectionForwarder,
    state: watch::Sender<ListenerState>,
}

impl ForwardingListener {
    pub fn new(
        rule: ForwardRule,
        transport: Arc<dyn Transport>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Starting);
        Self {
            rule,
            transport,
            shutdown,
            forwarder: ConnectionForwarder::new(),
            state,
        }
    }

    /// Observes state transitions.  Useful for learning the bound address
    /// when the rule asked for port 0.
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Runs the accept loop until shutdown fires or a listener-level error
    /// occurs.  On error the coordinator has already been fired when this
    /// returns.
    pub async fn run(self) -> Result<(), ListenerError> {
        let result = self.accept_loop().await;
        match &result {
            Ok(()) => {
                info!("stopped forwarding {}", self.rule);
                self.state.send_replace(ListenerState::Stopped);
            }
            Err(e) => {
                error!("forwarding {} failed: {e}", self.rule);
                self.state.send_replace(ListenerState::Failed {
                    error: e.to_string(),
                });
                self.shutdown.fire(ShutdownReason::ListenerFailed {
                    rule: self.rule.to_string(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn accept_loop(&self) -> Result<(), ListenerError> {
        let (mut listener, target) = self.open_listener().await?;
        let address = listener.local_address();
        info!("listening on {address} for {}", self.rule);
        self.state.send_replace(ListenerState::Listening {
            address: address.clone(),
        });

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return Ok(()),
                accepted = listener.accept() => accepted,
            };
            let Accepted { connection, peer } =
                accepted.map_err(|source| ListenerError::Accept {
                    address: address.clone(),
                    source,
                })?;
            info!("{peer}: accepted connection for {}", self.rule);
            self.spawn_relay(connection, peer, target.clone());
        }
    }

    async fn open_listener(&self) -> Result<(Box<dyn ChannelListener>, Target), ListenerError> {
        let address = self.rule.listen_address();
        let opened = match self.rule.direction() {
            Direction::LocalToRemote => TcpChannelListener::bind(address)
                .await
                .map(|l| -> Box<dyn ChannelListener> { Box::new(l) })
                .map(|l| (l, Target::Transport(Arc::clone(&self.transport)))),
            Direction::RemoteToLocal => self
                .transport
                .listen(address)
                .await
                .map(|l| (l, Target::Local)),
        };
        opened.map_err(|source| ListenerError::Listen {
            address: address.to_string(),
            source,
        })
    }

    fn spawn_relay(&self, client: Connection, peer: String, target: Target) {
        let target_address = self.rule.target_address().to_string();
        let forwarder = self.forwarder;
        tokio::spawn(async move {
            let remote = match target.open(&target_address).await {
                Ok(remote) => remote,
                Err(e) => {
                    warn!("{peer}: {e}");
                    info!("{peer}: closed");
                    return;
                }
            };
            forwarder.forward(client, remote, &peer).await;
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
