//! russh client callbacks: host key verification and inbound channel routing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use russh::client::{self, Msg, Session};
use russh::Channel;
use russh_keys::key::PublicKey;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A `forwarded-tcpip` channel opened by the server, waiting to be accepted.
pub struct InboundChannel {
    pub channel: Channel<Msg>,
    pub peer: String,
}

type RouteTable = HashMap<u32, mpsc::Sender<InboundChannel>>;

/// Bound remote port -> the listener that asked for it.
///
/// The client handler owns the only strong reference, so the table and every
/// sender in it are dropped when the SSH session ends.  Listeners then see
/// their receivers close.
#[derive(Clone, Default)]
pub struct ForwardRoutes {
    table: Arc<Mutex<RouteTable>>,
}

impl ForwardRoutes {
    pub fn downgrade(&self) -> WeakRoutes {
        WeakRoutes {
            table: Arc::downgrade(&self.table),
        }
    }

    fn lookup(&self, port: u32) -> Option<mpsc::Sender<InboundChannel>> {
        self.table.lock().ok()?.get(&port).cloned()
    }
}

/// Non-owning view of [`ForwardRoutes`] held by the transport and listeners.
#[derive(Clone, Default)]
pub struct WeakRoutes {
    table: Weak<Mutex<RouteTable>>,
}

impl WeakRoutes {
    /// Registers `sender` for `port`.  Returns `false` if the session is gone.
    pub fn insert(&self, port: u32, sender: mpsc::Sender<InboundChannel>) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let Ok(mut table) = table.lock() else {
            return false;
        };
        table.insert(port, sender);
        true
    }

    pub fn remove(&self, port: u32) {
        if let Some(table) = self.table.upgrade() {
            if let Ok(mut table) = table.lock() {
                table.remove(&port);
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.table.strong_count() > 0
    }
}

/// Normalises a fingerprint for comparison: drops an optional `SHA256:`
/// prefix and trailing base64 padding.
pub fn normalize_fingerprint(fingerprint: &str) -> &str {
    let trimmed = fingerprint.trim();
    trimmed
        .strip_prefix("SHA256:")
        .unwrap_or(trimmed)
        .trim_end_matches('=')
}

/// Per-session russh handler.
pub struct ClientHandler {
    expected_host_key: Option<String>,
    routes: ForwardRoutes,
}

impl ClientHandler {
    pub fn new(expected_host_key: Option<String>, routes: ForwardRoutes) -> Self {
        Self {
            expected_host_key,
            routes,
        }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        info!("server host key SHA256:{fingerprint}");
        match &self.expected_host_key {
            None => Ok(true),
            Some(expected)
                if normalize_fingerprint(expected) == normalize_fingerprint(&fingerprint) =>
            {
                Ok(true)
            }
            Some(expected) => {
                error!("host key mismatch: expected {expected}, server offered SHA256:{fingerprint}");
                Ok(false)
            }
        }
    }

    async fn server_channel_open_forwarded_tcpip(
        &mut self,
        channel: Channel<Msg>,
        connected_address: &str,
        connected_port: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let peer = format!("{originator_address}:{originator_port}");
        debug!("forwarded channel from {peer} to {connected_address}:{connected_port}");

        let Some(sender) = self.routes.lookup(connected_port) else {
            warn!("{peer}: no listener for remote port {connected_port}; closing channel");
            close_in_background(channel);
            return Ok(());
        };

        // The session loop must not block here, so a full or closed queue
        // just rejects the channel.
        if let Err(e) = sender.try_send(InboundChannel { channel, peer }) {
            let rejected = match e {
                mpsc::error::TrySendError::Full(c) | mpsc::error::TrySendError::Closed(c) => c,
            };
            warn!("{}: listener for remote port {connected_port} is not accepting", rejected.peer);
            close_in_background(rejected.channel);
        }
        Ok(())
    }
}

fn close_in_background(channel: Channel<Msg>) {
    tokio::spawn(async move {
        let _ = channel.close().await;
    });
}
