//! The local end of every tunnel: plain TCP sockets on this host.

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};

use crate::application::transport::{Accepted, ChannelListener, Connection, TransportError};

/// Opens a TCP connection to `address` on the local network.
pub async fn connect_local(address: &str) -> Result<Connection, TransportError> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| TransportError::dial(address, e))?;
    // Interactive protocols (RDP, SSH) suffer badly from Nagle batching.
    let _ = stream.set_nodelay(true);
    Ok(Box::new(stream))
}

/// A bound TCP listener exposed through the [`ChannelListener`] port.
#[derive(Debug)]
pub struct TcpChannelListener {
    inner: TcpListener,
    bound: String,
}

impl TcpChannelListener {
    /// Binds `address`.  Port 0 picks an ephemeral port; the chosen one is
    /// reported by [`ChannelListener::local_address`].
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        let inner = TcpListener::bind(address)
            .await
            .map_err(|e| TransportError::listen(address, e))?;
        let bound = inner
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| address.to_string());
        Ok(Self { inner, bound })
    }
}

#[async_trait]
impl ChannelListener for TcpChannelListener {
    async fn accept(&mut self) -> Result<Accepted, TransportError> {
        let (stream, peer) = self
            .inner
            .accept()
            .await
            .map_err(|e| TransportError::Accept(e.to_string()))?;
        let _ = stream.set_nodelay(true);
        Ok(Accepted {
            connection: Box::new(stream),
            peer: peer.to_string(),
        })
    }

    fn local_address(&self) -> String {
        self.bound.clone()
    }
}
