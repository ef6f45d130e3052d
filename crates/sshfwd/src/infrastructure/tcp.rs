//! Plain-TCP transport.
//!
//! `dial` and `listen` act directly on this host's network.  Used by the
//! `--direct` mode to try out a profile without an SSH server, and by the
//! integration tests to drive the forwarding engine over loopback.

use async_trait::async_trait;

use crate::application::local::{connect_local, TcpChannelListener};
use crate::application::transport::{ChannelListener, Connection, Transport, TransportError};

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn dial(&self, address: &str) -> Result<Connection, TransportError> {
        connect_local(address).await
    }

    async fn listen(&self, address: &str) -> Result<Box<dyn ChannelListener>, TransportError> {
        let listener = TcpChannelListener::bind(address).await?;
        Ok(Box::new(listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_listen_then_dial_round_trip() {
        // Arrange
        let transport = TcpTransport::new();
        let mut listener = transport.listen("127.0.0.1:0").await.unwrap();
        let address = listener.local_address();

        // Act
        let mut client = transport.dial(&address).await.unwrap();
        client.write_all(b"ok").await.unwrap();
        let mut accepted = listener.accept().await.unwrap();
        let mut buf = [0u8; 2];
        accepted.connection.read_exact(&mut buf).await.unwrap();

        // Assert
        assert_eq!(&buf, b"ok");
    }

    #[tokio::test]
    async fn test_listen_on_bad_address_fails() {
        let result = TcpTransport::new().listen("not-an-address").await;
        assert!(matches!(result, Err(TransportError::Listen { .. })));
    }
}
