//! SSH transport built on russh.
//!
//! One [`SshTransport`] wraps one authenticated SSH session:
//!
//! - `dial` opens a `direct-tcpip` channel; the server connects onwards.
//! - `listen` sends a `tcpip-forward` request; the server then opens a
//!   `forwarded-tcpip` channel for every connection it accepts, and the
//!   client handler routes it by bound port to the matching
//!   [`SshChannelListener`].
//!
//! When the session ends every listener's `accept` fails, which ends the
//! forwarding session through the usual listener-failure path.

pub mod handler;

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use sshfwd_core::split_host_port;

use crate::application::credentials::{SshAuth, SshSettings};
use crate::application::transport::{
    Accepted, ChannelListener, Connection, Transport, TransportError,
};

use self::handler::{ClientHandler, ForwardRoutes, InboundChannel, WeakRoutes};

/// Pending `forwarded-tcpip` channels buffered per listener.
const INBOUND_QUEUE_DEPTH: usize = 64;

/// Errors establishing or tearing down the SSH session.
#[derive(Debug, Error)]
pub enum SshError {
    #[error("unable to connect to SSH server {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: russh::Error,
    },

    #[error("SSH authentication error: {0}")]
    Auth(#[source] russh::Error),

    #[error("unable to load private key {path}: {source}")]
    LoadKey {
        path: String,
        #[source]
        source: russh_keys::Error,
    },

    #[error("SSH server rejected every authentication method for user '{user}'")]
    AuthenticationFailed { user: String },

    #[error("SSH disconnect failed: {0}")]
    Disconnect(#[source] russh::Error),
}

/// Only `tcpip_forward` takes the handle exclusively; channel opens, cancels
/// and the disconnect share it.
type SharedHandle = Arc<RwLock<Handle<ClientHandler>>>;

/// An authenticated SSH session usable as a [`Transport`].
pub struct SshTransport {
    handle: SharedHandle,
    routes: WeakRoutes,
    address: String,
}

impl SshTransport {
    /// Connects, verifies the host key and authenticates.
    ///
    /// Authentication methods are tried in order; the first one the server
    /// accepts wins.
    pub async fn connect(settings: &SshSettings) -> Result<Self, SshError> {
        let config = Arc::new(client::Config::default());
        let routes = ForwardRoutes::default();
        let weak_routes = routes.downgrade();
        let handler = ClientHandler::new(settings.host_key.clone(), routes);

        let mut handle = client::connect(config, settings.address.as_str(), handler)
            .await
            .map_err(|source| SshError::Connect {
                address: settings.address.clone(),
                source,
            })?;
        info!("connected to SSH server {}", settings.address);

        authenticate(&mut handle, settings).await?;
        info!("authenticated as {}", settings.user);

        Ok(Self {
            handle: Arc::new(RwLock::new(handle)),
            routes: weak_routes,
            address: settings.address.clone(),
        })
    }

    /// Sends a disconnect message to the server.
    pub async fn close(&self) -> Result<(), SshError> {
        let handle = self.handle.read().await;
        if handle.is_closed() {
            return Ok(());
        }
        handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(SshError::Disconnect)?;
        info!("disconnected from {}", self.address);
        Ok(())
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    settings: &SshSettings,
) -> Result<(), SshError> {
    for method in &settings.auth {
        let accepted = match method {
            SshAuth::Password(password) => {
                debug!("trying password authentication");
                handle
                    .authenticate_password(settings.user.clone(), password.clone())
                    .await
                    .map_err(SshError::Auth)?
            }
            SshAuth::PublicKey(path) => {
                debug!("trying public key {}", path.display());
                let key = russh_keys::load_secret_key(path, None).map_err(|source| {
                    SshError::LoadKey {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                handle
                    .authenticate_publickey(settings.user.clone(), Arc::new(key))
                    .await
                    .map_err(SshError::Auth)?
            }
        };
        if accepted {
            return Ok(());
        }
    }
    Err(SshError::AuthenticationFailed {
        user: settings.user.clone(),
    })
}

#[async_trait]
impl Transport for SshTransport {
    async fn dial(&self, address: &str) -> Result<Connection, TransportError> {
        let (host, port) =
            split_host_port(address).map_err(|e| TransportError::invalid_address(address, e))?;
        let channel = self
            .handle
            .read()
            .await
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(|e| TransportError::dial(address, e))?;
        Ok(Box::new(channel.into_stream()))
    }

    async fn listen(&self, address: &str) -> Result<Box<dyn ChannelListener>, TransportError> {
        let (host, port) =
            split_host_port(address).map_err(|e| TransportError::invalid_address(address, e))?;
        let requested = u32::from(port);
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);

        // Fixed ports are routed before the request so no early channel is lost.
        if requested != 0 && !self.routes.insert(requested, tx.clone()) {
            return Err(TransportError::listen(address, "SSH session closed"));
        }

        let assigned = self
            .handle
            .write()
            .await
            .tcpip_forward(host, requested)
            .await;
        let bound_port = match assigned {
            Ok(assigned) if requested == 0 => assigned,
            Ok(_) => requested,
            Err(e) => {
                self.routes.remove(requested);
                return Err(TransportError::listen(address, e));
            }
        };
        if requested == 0 && !self.routes.insert(bound_port, tx) {
            return Err(TransportError::listen(address, "SSH session closed"));
        }

        let bound = format!("{host}:{bound_port}");
        debug!("remote listener registered on {bound}");
        Ok(Box::new(SshChannelListener {
            rx,
            host: host.to_string(),
            port: bound_port,
            bound,
            routes: self.routes.clone(),
            handle: Arc::clone(&self.handle),
        }))
    }
}

/// Receives the `forwarded-tcpip` channels for one remote port.
///
/// Dropping it unregisters the route and cancels the forward on the server.
pub struct SshChannelListener {
    rx: mpsc::Receiver<InboundChannel>,
    host: String,
    port: u32,
    bound: String,
    routes: WeakRoutes,
    handle: SharedHandle,
}

#[async_trait]
impl ChannelListener for SshChannelListener {
    async fn accept(&mut self) -> Result<Accepted, TransportError> {
        let inbound = self.rx.recv().await.ok_or(TransportError::Closed)?;
        Ok(Accepted {
            connection: Box::new(inbound.channel.into_stream()),
            peer: inbound.peer,
        })
    }

    fn local_address(&self) -> String {
        self.bound.clone()
    }
}

impl Drop for SshChannelListener {
    fn drop(&mut self) {
        self.routes.remove(self.port);
        if !self.routes.is_alive() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let handle = Arc::clone(&self.handle);
        let host = std::mem::take(&mut self.host);
        let port = self.port;
        runtime.spawn(async move {
            if let Err(e) = handle.read().await.cancel_tcpip_forward(host, port).await {
                warn!("cancelling remote forward on port {port} failed: {e}");
            }
        });
    }
}
