//! Transport port: the capability the forwarding core needs from the outside.
//!
//! A [`Transport`] can open outbound byte streams (`dial`) and register
//! inbound listeners (`listen`).  The SSH client implements it with
//! `direct-tcpip` and `tcpip-forward` channels; plain local TCP implements it
//! with sockets.  Either way the forwarding code only ever sees a
//! [`Connection`]: a boxed duplex byte stream.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use sshfwd_core::AddressError;

/// A duplex byte stream: anything tokio can read from and write to.
///
/// TCP sockets and SSH channel streams both qualify, so the forwarder is
/// written once for both.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized {}

/// An owned, type-erased byte stream.
pub type Connection = Box<dyn ByteStream>;

/// Errors surfaced by [`Transport`] and [`ChannelListener`] implementations.
///
/// Underlying library errors are flattened to strings so the core does not
/// depend on any particular SSH or socket library.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("unable to connect to {address}: {reason}")]
    Dial { address: String, reason: String },

    #[error("unable to listen on {address}: {reason}")]
    Listen { address: String, reason: String },

    #[error("accept failed: {0}")]
    Accept(String),

    /// The listener's underlying resource went away (socket closed, SSH
    /// session ended).
    #[error("listener closed")]
    Closed,
}

impl TransportError {
    pub fn dial(address: &str, reason: impl fmt::Display) -> Self {
        Self::Dial {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn listen(address: &str, reason: impl fmt::Display) -> Self {
        Self::Listen {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_address(address: &str, source: AddressError) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            source,
        }
    }
}

/// One connection handed out by [`ChannelListener::accept`].
pub struct Accepted {
    pub connection: Connection,
    /// Human-readable peer description used in log records.
    pub peer: String,
}

impl fmt::Debug for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accepted").field("peer", &self.peer).finish()
    }
}

/// An inbound connection source.
///
/// `accept` yields connections until the underlying resource fails, after
/// which every call returns an error.  Dropping the listener releases the
/// resource.
#[async_trait]
pub trait ChannelListener: Send {
    async fn accept(&mut self) -> Result<Accepted, TransportError>;

    /// The address actually bound (differs from the requested one when port 0
    /// was asked for).
    fn local_address(&self) -> String;
}

/// Outbound dialing and inbound listening over some network.
///
/// Implementations must be usable from many tasks at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a byte stream to `address` (`host:port`).
    async fn dial(&self, address: &str) -> Result<Connection, TransportError>;

    /// Starts accepting connections addressed to `address` (`host:port`).
    async fn listen(&self, address: &str) -> Result<Box<dyn ChannelListener>, TransportError>;
}
